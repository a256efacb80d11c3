pub mod backend_monitor;
pub mod broadcast_service;
pub mod documentation;
pub mod health_service;
pub mod heartbeat_sweeper;
pub mod question_bank;
pub mod quiz_service;
pub mod websocket_service;
