pub mod cache;
pub mod catalog;
pub mod pager;
pub mod session;
pub mod tmdb;
pub mod watchlist;
