//! Server Tests
//!
//! Run a server on an ephemeral port and talk RESP to it.

use std::io::{BufReader, BufWriter, Write};
use std::net::TcpStream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use emberkv::network::Server;
use emberkv::protocol::{read_reply, write_command, Command, Reply, ReplyError};
use emberkv::{Config, Databases};
use tempfile::TempDir;

use crate::bulk;

struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        Self {
            writer: BufWriter::new(stream.try_clone().unwrap()),
            reader: BufReader::new(stream),
        }
    }

    fn call(&mut self, words: &[&str]) -> Reply {
        let command =
            Command::from_parts(words.iter().map(|w| w.as_bytes().to_vec()).collect()).unwrap();
        write_command(&mut self.writer, &command).unwrap();
        read_reply(&mut self.reader).unwrap()
    }
}

fn start(max_connections: usize) -> (TempDir, std::net::SocketAddr, impl FnOnce()) {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .databases(2)
        .listen_addr("127.0.0.1:0")
        .max_connections(max_connections)
        .build();
    let databases = Arc::new(Databases::open(&config).unwrap());

    let mut server = Server::new(config, databases);
    let addr = server.bind().unwrap();
    let shutdown = server.shutdown_handle();
    let thread = thread::spawn(move || server.run().unwrap());

    let stop = move || {
        shutdown.store(true, Ordering::SeqCst);
        thread.join().unwrap();
    };
    (dir, addr, stop)
}

#[test]
fn test_round_trip_over_tcp() {
    let (_dir, addr, stop) = start(8);
    let mut client = Client::connect(addr);

    assert_eq!(client.call(&["PING"]), Reply::Status("PONG".into()));
    assert_eq!(client.call(&["HSET", "user", "name", "ada"]), Reply::Integer(1));
    assert_eq!(client.call(&["HGET", "user", "name"]), bulk("ada"));
    assert_eq!(
        client.call(&["HGETALL", "user"]),
        Reply::Array(vec![bulk("name"), bulk("ada")])
    );
    assert_eq!(
        client.call(&["NOPE"]),
        Reply::Error(ReplyError::Remote("ERR unknown command 'nope'".into()))
    );

    drop(client);
    stop();
}

#[test]
fn test_selected_database_is_per_connection() {
    let (_dir, addr, stop) = start(8);
    let mut first = Client::connect(addr);
    let mut second = Client::connect(addr);

    assert_eq!(first.call(&["SELECT", "1"]), Reply::ok());
    first.call(&["HSET", "k", "f", "v"]);

    assert_eq!(second.call(&["HGET", "k", "f"]), Reply::Nil);
    assert_eq!(second.call(&["SELECT", "1"]), Reply::ok());
    assert_eq!(second.call(&["HGET", "k", "f"]), bulk("v"));

    stop();
}

#[test]
fn test_pipelined_requests() {
    let (_dir, addr, stop) = start(8);
    let mut client = Client::connect(addr);

    client
        .writer
        .write_all(b"HSET k a 1\r\nHSET k b 2\r\nHLEN k\r\n")
        .unwrap();
    client.writer.flush().unwrap();

    assert_eq!(read_reply(&mut client.reader).unwrap(), Reply::Integer(1));
    assert_eq!(read_reply(&mut client.reader).unwrap(), Reply::Integer(1));
    assert_eq!(read_reply(&mut client.reader).unwrap(), Reply::Integer(2));

    stop();
}

#[test]
fn test_connection_limit() {
    let (_dir, addr, stop) = start(1);
    let mut first = Client::connect(addr);
    assert_eq!(first.call(&["PING"]), Reply::Status("PONG".into()));

    let mut second = Client::connect(addr);
    assert_eq!(
        read_reply(&mut second.reader).unwrap(),
        Reply::Error(ReplyError::Remote("ERR max number of clients reached".into()))
    );

    stop();
}

#[test]
fn test_protocol_error_closes_connection() {
    let (_dir, addr, stop) = start(8);
    let mut client = Client::connect(addr);

    client.writer.write_all(b"*1\r\n:4\r\n").unwrap();
    client.writer.flush().unwrap();

    match read_reply(&mut client.reader).unwrap() {
        Reply::Error(ReplyError::Remote(line)) => assert!(line.starts_with("ERR Protocol error")),
        other => panic!("Expected protocol error, got {:?}", other),
    }

    stop();
}

#[test]
fn test_shutdown_flag_releases_databases_for_close() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .databases(1)
        .listen_addr("127.0.0.1:0")
        .build();
    let databases = Arc::new(Databases::open(&config).unwrap());

    let mut server = Server::new(config.clone(), Arc::clone(&databases));
    let addr = server.bind().unwrap();
    let shutdown = server.shutdown_handle();
    let thread = thread::spawn(move || {
        server.run().unwrap();
        server
    });

    // Left connected so shutdown has to close it
    let mut client = Client::connect(addr);
    assert_eq!(client.call(&["HSET", "user", "name", "ada"]), Reply::Integer(1));

    // What the signal handler in the server binary does
    shutdown.store(true, Ordering::SeqCst);
    drop(thread.join().unwrap());

    let databases = Arc::try_unwrap(databases).ok().unwrap();
    databases.close().unwrap();
    drop(client);

    let databases = Databases::open(&config).unwrap();
    let keyspace = databases.get(0).unwrap().read();
    assert_eq!(
        keyspace.get_field(b"user", b"name").unwrap(),
        Some(b"ada".to_vec())
    );
}
