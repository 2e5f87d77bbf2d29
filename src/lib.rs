pub mod api;
pub mod cli;
pub mod edit;
pub mod io;
pub mod model;
pub mod ops;
pub mod optimistic;
pub mod paging;
pub mod session;
pub mod store;
pub mod tui;
pub mod util;
