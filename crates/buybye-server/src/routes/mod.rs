pub mod concepts;
