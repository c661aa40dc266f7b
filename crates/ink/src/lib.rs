//! padsign ink - signature strokes and their portable path form
//!
//! - [`codec`] - strokes to a scaled SVG move/line path and back
//! - [`sig_string`] - adapter for the vendor service's flat coordinate list
//! - [`canvas`] - pointer-driven capture when no pad is reachable
//! - [`geometry`] - bounds and fit transforms shared by the above

pub mod canvas;
pub mod codec;
pub mod geometry;
pub mod sig_string;

pub use canvas::*;
pub use codec::*;
pub use geometry::*;
pub use sig_string::*;
