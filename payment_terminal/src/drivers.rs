pub mod bbs;
