pub mod consume;
pub mod cte;
pub mod delete;
pub mod select;
pub mod window;
