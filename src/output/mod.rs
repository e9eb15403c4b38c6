// Output rendering: skeleton text/JSON and dependency graph views

pub mod diagrams;
pub mod skeleton;

pub use diagrams::{render_adjacency, DiagramGenerator};
pub use skeleton::{extract_skeleton, SkeletonFormat, SkeletonOptions};

/// Batch footer text: `<n> files, <ok> parsed, <failed> failed`
pub fn batch_counts(files: usize, parsed: usize, failed: usize) -> String {
    format!("{} files, {} parsed, {} failed", files, parsed, failed)
}
