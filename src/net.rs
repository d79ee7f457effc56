pub mod output;
pub mod sink;
pub mod telnet;
