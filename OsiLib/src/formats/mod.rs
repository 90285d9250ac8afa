//! Binary resource format support

pub mod lsf;
