pub mod object_map;
pub mod value;
