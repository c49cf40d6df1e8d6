//! Protocol Module
//!
//! RESP2, the request/reply protocol spoken by Redis clients.
//!
//! ## Requests
//! ```text
//! *3\r\n$4\r\nHGET\r\n$3\r\nkey\r\n$5\r\nfield\r\n
//! ```
//! Inline requests (`HGET key field\r\n`) are accepted too.
//!
//! ## Replies
//! | Prefix | Reply        |
//! |--------|--------------|
//! | `+`    | status       |
//! | `-`    | error        |
//! | `:`    | integer      |
//! | `$`    | bulk / nil   |
//! | `*`    | array        |

mod codec;
mod command;
mod response;

pub use codec::{
    decode_command, decode_reply, encode_command, encode_reply, read_command, read_reply,
    write_command, write_reply, MAX_ARRAY_LEN, MAX_BULK_LEN, MAX_LINE_LEN,
};
pub use command::Command;
pub use response::{Reply, ReplyError};
