#![allow(dead_code)]
#![allow(unused_imports)]
pub mod apply;
pub mod context;
pub mod dense_apply;
pub mod dist;
pub mod errors;
pub mod sparse;
pub mod sparse_apply;
pub mod test_assist;
pub mod transform;
