//! EmberKV CLI Client
//!
//! Sends one command to a server and prints the reply.
//!
//! ```text
//! emberkv-cli HSET user:1 name ada
//! emberkv-cli -s 127.0.0.1:7000 HGETALL user:1
//! ```

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::process::ExitCode;

use clap::Parser;
use emberkv::protocol::{read_reply, write_command, Command, Reply};

/// EmberKV CLI
#[derive(Parser, Debug)]
#[command(name = "emberkv-cli")]
#[command(about = "CLI for the EmberKV server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    /// Command name followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let parts = args.command.into_iter().map(String::into_bytes).collect();
    let Some(command) = Command::from_parts(parts) else {
        eprintln!("no command given");
        return ExitCode::FAILURE;
    };

    match run(&args.server, &command) {
        Ok(reply) => {
            print_reply(&reply, 0);
            if reply.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Could not talk to {}: {}", args.server, e);
            ExitCode::FAILURE
        }
    }
}

fn run(server: &str, command: &Command) -> emberkv::Result<Reply> {
    let stream = TcpStream::connect(server)?;
    let mut writer = BufWriter::new(stream.try_clone()?);
    let mut reader = BufReader::new(stream);

    write_command(&mut writer, command)?;
    read_reply(&mut reader)
}

/// Print in the style of redis-cli
fn print_reply(reply: &Reply, indent: usize) {
    match reply {
        Reply::Nil => println!("(nil)"),
        Reply::Integer(n) => println!("(integer) {}", n),
        Reply::Bulk(data) => println!("\"{}\"", String::from_utf8_lossy(data)),
        Reply::Status(status) => println!("{}", status),
        Reply::Error(err) => println!("(error) {}", err),
        Reply::Array(items) if items.is_empty() => println!("(empty array)"),
        Reply::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    print!("{:indent$}", "", indent = indent);
                }
                print!("{}) ", i + 1);
                print_reply(item, indent + 3);
            }
        }
    }
}
