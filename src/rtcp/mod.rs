//! RTCP compound packet support per RFC3550: sender/receiver reports,
//! SDES, and BYE. Feedback packet types (NACK/PLI) and APP are outside
//! this engine's scope and are skipped rather than parsed.

pub mod bye;
pub mod common_header;
pub mod packet_type;
pub mod receiver_report;
pub mod report_block;
pub mod rtcp;
pub mod rtcp_error;
pub mod sdes;
pub mod sender_info;
pub mod sender_report;
