use crate::int_newtype;

int_newtype!(PropertyId, i32);
