pub mod cell;
pub mod locale;
pub mod normalize;
pub mod table;

pub use cell::{Cell, RawSheet};
pub use locale::NumberFormat;
pub use normalize::{normalize, renormalize, NormalizeOptions};
pub use table::{Column, NormalizedTable};
