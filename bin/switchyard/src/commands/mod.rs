pub mod bootstrap;
pub mod config_cmd;
pub mod gateway;
pub mod route_cmd;
pub mod rpc_cmd;
pub mod run_cmd;
pub mod tools_cmd;
