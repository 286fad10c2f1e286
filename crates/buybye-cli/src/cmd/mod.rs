pub mod call;
pub mod check;
pub mod init;
pub mod routes;
pub mod serve;
pub mod syncs;
