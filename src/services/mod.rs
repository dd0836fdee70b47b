pub mod audit;
pub mod bootstrap_admin;
pub mod category_cache;
pub mod dashboard;
pub mod email;
pub mod identity;
pub mod mutation;
pub mod overview;
pub mod pagination;
pub mod query;
pub mod table;
