#![allow(dead_code)]

pub mod json_server;
pub mod remote_mock;
