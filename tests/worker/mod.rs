mod lifecycle;
mod memory_server;
