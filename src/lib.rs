pub mod archive;
pub mod config;
pub mod datatype;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod html;
pub mod investigation;
pub mod isa;
pub mod output;

pub use datatype::{BaseDatatype, Datatype, IngestReport};
pub use error::IsaError;
pub use isa::IsaDatatype;
