pub mod gmail;
