use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use kvwrap_client::{ClientError, CommandFlags, Connection, ConnectionConfig, FailureKind};

type Handler = fn(usize, Vec<Vec<u8>>, &mut TcpStream);

/// Serves `sessions` connections in turn, each answering `per_session[i]`
/// commands through `handler` before the stream is dropped.
fn spawn_server(per_session: Vec<usize>, handler: Handler) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();

    thread::spawn(move || {
        let mut idx = 0;
        for expected in per_session {
            let (mut stream, _) = listener.accept().expect("accept");
            let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            for _ in 0..expected {
                let args = read_command(&mut reader).expect("read command");
                handler(idx, args, &mut stream);
                idx += 1;
            }
        }
    });

    port
}

fn read_command(reader: &mut BufReader<TcpStream>) -> std::io::Result<Vec<Vec<u8>>> {
    let mut line = Vec::new();
    read_line(reader, &mut line)?;
    if line.first() != Some(&b'*') {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?;
        if line.first() != Some(&b'$') {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if crlf != [b'\r', b'\n'] {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing crlf"));
        }
        args.push(data);
    }
    Ok(args)
}

fn read_line(reader: &mut BufReader<TcpStream>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "digit"))
}

fn write_raw(stream: &mut TcpStream, raw: &[u8]) {
    let _ = stream.write_all(raw);
    let _ = stream.flush();
}

fn config(port: u16) -> ConnectionConfig {
    ConnectionConfig::tcp("127.0.0.1", port)
        .with_connect_timeout(Duration::from_secs(1))
        .with_io_timeout(Duration::from_secs(2))
}

#[test]
fn set_get_roundtrip_over_tcp() {
    let port = spawn_server(vec![3], |idx, args, stream| match idx {
        0 => {
            assert_eq!(args, vec![b"CLIENT".to_vec(), b"SETNAME".to_vec(), b"tcp-test".to_vec()]);
            write_raw(stream, b"+OK\r\n");
        }
        1 => {
            assert_eq!(args, vec![b"SET".to_vec(), b"foo".to_vec(), b"123".to_vec()]);
            write_raw(stream, b"+OK\r\n");
        }
        _ => {
            assert_eq!(args, vec![b"GET".to_vec(), b"foo".to_vec()]);
            write_raw(stream, b"$3\r\n123\r\n");
        }
    });

    let mut conn = Connection::open(config(port).with_name("tcp-test")).expect("connect");
    assert!(conn.is_connected());
    assert!(!conn.has_response());

    assert!(conn.cmd(CommandFlags::DEFAULT, "SET", ("foo", 123)).truthy());
    let value: i64 = conn.cmd_as(CommandFlags::DEFAULT, "GET", "foo").expect("get");
    assert_eq!(value, 123);
    assert_eq!(conn.num_responses(), 1);
}

#[test]
fn array_reply_over_tcp_drains_in_order() {
    let port = spawn_server(vec![1], |_, args, stream| {
        assert_eq!(args[0], b"LRANGE");
        write_raw(stream, b"*3\r\n$1\r\nA\r\n:2\r\n$-1\r\n");
    });

    let mut conn = Connection::open(config(port)).expect("connect");
    assert!(conn.cmd(CommandFlags::DEFAULT, "LRANGE", ("list", 0, -1)).is_success());

    assert_eq!(conn.response(true, false).payload(), "A");
    assert_eq!(conn.response_as::<i64>(true, false).expect("integer"), 2);
    assert!(conn.response(true, false).is_nil());
    assert!(!conn.has_response());
}

#[test]
fn dropped_stream_is_retried_on_a_new_session() {
    // First session reads the command and hangs up without replying.
    let port = spawn_server(vec![1, 1], |idx, args, stream| {
        assert_eq!(args[0], b"PING");
        if idx == 1 {
            write_raw(stream, b"+PONG\r\n");
        }
    });

    let mut conn = Connection::open(config(port)).expect("connect");
    let response = conn.cmd(CommandFlags::DEFAULT, "PING", ());

    assert!(response.is_success(), "{}", response);
    assert_eq!(response.payload(), "PONG");
    assert_eq!(conn.reconnect_count(), 1);
}

#[test]
fn oversized_length_header_is_retried_not_fatal() {
    let port = spawn_server(vec![1, 1], |idx, args, stream| {
        assert_eq!(args[0], b"GET");
        if idx == 0 {
            write_raw(stream, b"$9223372036854775807\r\nabc");
        } else {
            write_raw(stream, b"$2\r\nok\r\n");
        }
    });

    let mut conn = Connection::open(config(port)).expect("connect");
    let response = conn.cmd(CommandFlags::DEFAULT, "GET", "key");

    assert_eq!(response.payload(), "ok");
    assert_eq!(conn.reconnect_count(), 1);
}

#[test]
fn unreachable_server_fails_construction() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let result = Connection::open(config(port));
    assert!(matches!(result, Err(ClientError::Connect(_))));
}

#[test]
fn server_error_reply_is_a_failed_response() {
    let port = spawn_server(vec![1], |_, _, stream| {
        write_raw(stream, b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n");
    });

    let mut conn = Connection::open(config(port)).expect("connect");
    let response = conn.cmd(CommandFlags::DEFAULT, "INCR", "list");

    assert_eq!(response.failure_kind(), Some(FailureKind::Protocol));
    assert!(response.payload().starts_with("WRONGTYPE"));
    assert!(conn.is_connected());
}

#[cfg(unix)]
#[test]
fn unix_socket_endpoint() {
    use std::os::unix::net::UnixListener;

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("kv.sock");
    let listener = UnixListener::bind(&path).expect("bind unix");
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut buf = [0u8; 64];
        let _ = stream.read(&mut buf);
        let _ = stream.write_all(b":1\r\n");
    });

    let mut conn = Connection::unix(&path).expect("connect");
    assert_eq!(conn.socket(), Some(path.as_path()));
    assert!(conn.cmd(CommandFlags::DEFAULT, "EXISTS", "key").truthy());
}
