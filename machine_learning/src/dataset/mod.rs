mod dataloader;
#[allow(clippy::module_inception)]
mod dataset;
mod idx;
mod shard;

pub use dataloader::{Batches, DataLoader};
pub use dataset::{BatchRef, Dataset, Sample};
pub use idx::{FashionMnist, read_images, read_labels};
pub use shard::{ShardSpec, shard_range};
