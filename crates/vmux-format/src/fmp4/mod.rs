//! 分片 MP4 (fMP4) box 构建.

pub mod boxes;
pub mod fragment;
pub mod init;

pub use boxes::{FourCc, Mp4Box, find_box, iter_boxes, make_box};
pub use fragment::{FragmentSample, SampleFlags, build_fragment, build_moof};
pub use init::init_segment;
