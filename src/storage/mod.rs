// Snapshot storage
//
// Two layers:
// - `BlobStore`: raw object storage (exists/read/write with a visibility flag)
// - `SnapshotStore`: the naming policy on top of it. Every snapshot lives at
//   `{repository}/benchmarks/{variant}` where the variant is either the
//   mutable `latest` pointer or an immutable timestamped token.
//
// Nothing here ever deletes an object. `latest` is overwritten on every
// promoting run, timestamped variants accumulate as an audit trail.

mod blob;
mod snapshot;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore, Visibility};
pub use snapshot::{SnapshotKey, SnapshotStore, SnapshotVariant, TimeToken};
