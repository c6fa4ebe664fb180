use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use vivace_mysql::{auth, Client, Config, Connection, Error, ErrorPolicy, LogSink, NullSink, Value};

/// The 20-byte challenge every scripted session advertises. No zero bytes,
/// so the client sees it exactly as sent.
const SCRAMBLE: [u8; 20] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
];

const CAPS: u32 = 0x0000_0001 // LONG_PASSWORD
    | 0x0000_0004 // LONG_FLAG
    | 0x0000_0008 // CONNECT_WITH_DB
    | 0x0000_0200 // PROTOCOL_41
    | 0x0000_2000 // TRANSACTIONS
    | 0x0000_8000 // SECURE_CONNECTION
    | 0x0008_0000; // PLUGIN_AUTH

const AUTOCOMMIT: u16 = 0x0002;
const IN_TRANS: u16 = 0x0001;

// ─── Wire helpers ──────────────────────────────────────────────

fn write_packet(stream: &mut TcpStream, seq: u8, payload: &[u8]) {
    let len = (payload.len() as u32).to_le_bytes();
    let _ = stream.write_all(&[len[0], len[1], len[2], seq]);
    let _ = stream.write_all(payload);
    let _ = stream.flush();
}

fn read_packet(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let mut head = [0u8; 4];
    stream.read_exact(&mut head).expect("packet header");
    let len = u32::from_le_bytes([head[0], head[1], head[2], 0]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).expect("packet payload");
    (head[3], payload)
}

fn push_lenenc(buf: &mut Vec<u8>, value: u64) {
    if value < 0xfb {
        buf.push(value as u8);
    } else if value <= 0xffff {
        buf.push(0xfc);
        buf.extend_from_slice(&(value as u16).to_le_bytes());
    } else {
        buf.push(0xfe);
        buf.extend_from_slice(&value.to_le_bytes());
    }
}

fn push_lenenc_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    push_lenenc(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

fn greeting() -> Vec<u8> {
    let mut body = vec![10];
    body.extend_from_slice(b"8.0.36-mock\0");
    body.extend_from_slice(&42u32.to_le_bytes());
    body.extend_from_slice(&SCRAMBLE[..8]);
    body.push(0);
    body.extend_from_slice(&(CAPS as u16).to_le_bytes());
    body.push(45); // server collation
    body.extend_from_slice(&AUTOCOMMIT.to_le_bytes());
    body.extend_from_slice(&((CAPS >> 16) as u16).to_le_bytes());
    body.push(21); // auth data length
    body.extend_from_slice(&[0u8; 10]);
    body.extend_from_slice(&SCRAMBLE[8..]);
    body.push(0);
    body.extend_from_slice(b"mysql_native_password\0");
    body
}

fn ok_body(affected: u64, insert_id: u64, status: u16) -> Vec<u8> {
    let mut body = vec![0x00];
    push_lenenc(&mut body, affected);
    push_lenenc(&mut body, insert_id);
    body.extend_from_slice(&status.to_le_bytes());
    body.extend_from_slice(&0u16.to_le_bytes());
    body
}

fn eof_body(status: u16) -> Vec<u8> {
    let mut body = vec![0xfe];
    body.extend_from_slice(&0u16.to_le_bytes());
    body.extend_from_slice(&status.to_le_bytes());
    body
}

fn err_body(code: u16, state: &str, message: &str) -> Vec<u8> {
    let mut body = vec![0xff];
    body.extend_from_slice(&code.to_le_bytes());
    body.push(b'#');
    body.extend_from_slice(state.as_bytes());
    body.extend_from_slice(message.as_bytes());
    body
}

fn column_body(name: &str, col_type: u8, charset: u16) -> Vec<u8> {
    let mut body = Vec::new();
    push_lenenc_bytes(&mut body, b"def");
    push_lenenc_bytes(&mut body, b"demo");
    push_lenenc_bytes(&mut body, b"t");
    push_lenenc_bytes(&mut body, b"t");
    push_lenenc_bytes(&mut body, name.as_bytes());
    push_lenenc_bytes(&mut body, name.as_bytes());
    body.push(0x0c);
    body.extend_from_slice(&charset.to_le_bytes());
    body.extend_from_slice(&255u32.to_le_bytes());
    body.push(col_type);
    body.extend_from_slice(&0u16.to_le_bytes()); // flags
    body.push(0); // decimals
    body.extend_from_slice(&[0, 0]); // filler
    body
}

// ─── Scripted server ───────────────────────────────────────────

/// Accept one connection and drive it through the handshake, verifying the
/// client's credentials along the way. Returns the authenticated stream.
fn auth_session(listener: &TcpListener, user: &str, password: &str, database: &str) -> TcpStream {
    let (mut stream, _) = listener.accept().expect("accept");
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    write_packet(&mut stream, 0, &greeting());

    let (seq, response) = read_packet(&mut stream);
    assert_eq!(seq, 1, "handshake response must continue the sequence");
    let caps = u32::from_le_bytes([response[0], response[1], response[2], response[3]]);
    assert_ne!(caps & 0x200, 0, "client must speak protocol 4.1");
    assert_eq!(response[8], 33, "utf8 maps to collation 33");

    // user comes after caps, max packet size, collation and 23 filler bytes
    let tail = &response[32..];
    let user_end = tail.iter().position(|&b| b == 0).expect("user terminator");
    assert_eq!(&tail[..user_end], user.as_bytes());
    let token_len = tail[user_end + 1] as usize;
    let token = &tail[user_end + 2..user_end + 2 + token_len];
    assert_eq!(token, auth::native_password_scramble(password, &SCRAMBLE));
    if caps & 0x8 != 0 {
        let rest = &tail[user_end + 2 + token_len..];
        let db_end = rest.iter().position(|&b| b == 0).expect("db terminator");
        assert_eq!(&rest[..db_end], database.as_bytes());
    }
    write_packet(&mut stream, 2, &ok_body(0, 0, AUTOCOMMIT));

    // the connection applies its character set right after authenticating
    let (seq, query) = read_packet(&mut stream);
    assert_eq!(seq, 0);
    assert_eq!(query[0], 0x03);
    assert_eq!(&query[1..], b"SET NAMES utf8");
    write_packet(&mut stream, 1, &ok_body(0, 0, AUTOCOMMIT));
    stream
}

/// Answer one COM_STMT_PREPARE with the given statement metadata.
fn serve_prepare(
    stream: &mut TcpStream,
    id: u32,
    sql: &str,
    params: u16,
    columns: &[(&str, u8, u16)],
) {
    let (seq, packet) = read_packet(stream);
    assert_eq!(seq, 0);
    assert_eq!(packet[0], 0x16, "expected COM_STMT_PREPARE");
    assert_eq!(&packet[1..], sql.as_bytes());

    let mut body = vec![0x00];
    body.extend_from_slice(&id.to_le_bytes());
    body.extend_from_slice(&(columns.len() as u16).to_le_bytes());
    body.extend_from_slice(&params.to_le_bytes());
    body.push(0);
    body.extend_from_slice(&0u16.to_le_bytes());
    let mut seq = 1;
    write_packet(stream, seq, &body);
    seq += 1;
    for _ in 0..params {
        write_packet(stream, seq, &column_body("?", 0xfd, 63));
        seq += 1;
    }
    if params > 0 {
        write_packet(stream, seq, &eof_body(AUTOCOMMIT));
        seq += 1;
    }
    for (name, col_type, charset) in columns {
        write_packet(stream, seq, &column_body(name, *col_type, *charset));
        seq += 1;
    }
    if !columns.is_empty() {
        write_packet(stream, seq, &eof_body(AUTOCOMMIT));
    }
}

/// Read a COM_STMT_EXECUTE for the given statement and hand back its
/// payload for byte-level assertions.
fn read_execute(stream: &mut TcpStream, id: u32) -> Vec<u8> {
    let (seq, packet) = read_packet(stream);
    assert_eq!(seq, 0);
    assert_eq!(packet[0], 0x17, "expected COM_STMT_EXECUTE");
    let got = u32::from_le_bytes([packet[1], packet[2], packet[3], packet[4]]);
    assert_eq!(got, id);
    packet
}

fn expect_close(stream: &mut TcpStream, id: u32) {
    let (_, packet) = read_packet(stream);
    assert_eq!(packet[0], 0x19, "expected COM_STMT_CLOSE");
    let got = u32::from_le_bytes([packet[1], packet[2], packet[3], packet[4]]);
    assert_eq!(got, id);
}

enum Cell {
    Null,
    I64(i64),
    Str(&'static str),
}

fn binary_row(column_count: usize, cells: &[Cell]) -> Vec<u8> {
    let bitmap_len = (column_count + 9) / 8;
    let mut body = vec![0x00];
    body.extend_from_slice(&vec![0u8; bitmap_len]);
    for (i, cell) in cells.iter().enumerate() {
        if matches!(cell, Cell::Null) {
            let bit = i + 2;
            body[1 + bit / 8] |= 1 << (bit % 8);
        }
    }
    for cell in cells {
        match cell {
            Cell::Null => {}
            Cell::I64(v) => body.extend_from_slice(&v.to_le_bytes()),
            Cell::Str(s) => push_lenenc_bytes(&mut body, s.as_bytes()),
        }
    }
    body
}

/// Write a full binary-protocol result set in response to an execute.
fn write_resultset(stream: &mut TcpStream, columns: &[(&str, u8, u16)], rows: &[Vec<Cell>]) {
    let mut seq = 1;
    let mut head = Vec::new();
    push_lenenc(&mut head, columns.len() as u64);
    write_packet(stream, seq, &head);
    seq += 1;
    for (name, col_type, charset) in columns {
        write_packet(stream, seq, &column_body(name, *col_type, *charset));
        seq += 1;
    }
    write_packet(stream, seq, &eof_body(AUTOCOMMIT));
    seq += 1;
    for row in rows {
        write_packet(stream, seq, &binary_row(columns.len(), row));
        seq += 1;
    }
    write_packet(stream, seq, &eof_body(AUTOCOMMIT));
}

#[derive(Default)]
struct CaptureSink {
    lines: Mutex<Vec<String>>,
}

impl LogSink for CaptureSink {
    fn log(&self, message: &str) {
        self.lines.lock().expect("sink lock").push(message.to_string());
    }
}

fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    (listener, port)
}

fn test_config(port: u16) -> Config {
    Config::new("127.0.0.1", port, "app", "", "demo")
}

fn strict_client(port: u16) -> Client {
    Client::new(test_config(port), Arc::new(NullSink), ErrorPolicy::Strict)
}

// ─── Tests ─────────────────────────────────────────────────────

#[test]
fn execute_sends_typed_params_and_returns_affected_rows() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        serve_prepare(&mut stream, 1, "UPDATE t SET x = ? WHERE id = ?", 2, &[]);
        let execute = read_execute(&mut stream, 1);
        // cursor flag and iteration count
        assert_eq!(execute[5], 0x00);
        assert_eq!(&execute[6..10], &1u32.to_le_bytes());
        // no NULLs, new params bound, i64 then string type slots
        assert_eq!(execute[10], 0x00);
        assert_eq!(execute[11], 0x01);
        assert_eq!(&execute[12..16], &[0x08, 0x00, 0xfd, 0x00]);
        assert_eq!(&execute[16..24], &5u64.to_le_bytes());
        assert_eq!(&execute[24..], &[3, b'a', b'b', b'c']);
        write_packet(&mut stream, 1, &ok_body(3, 0, AUTOCOMMIT));
        expect_close(&mut stream, 1);
    });

    let mut client = strict_client(port);
    let affected = client
        .execute("UPDATE t SET x = ? WHERE id = ?", &[&5i64, &"abc"])
        .expect("execute");
    assert_eq!(affected, 3);
    server.join().expect("server");
}

#[test]
fn insert_returns_generated_id() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        serve_prepare(&mut stream, 1, "INSERT INTO users(name) VALUES(?)", 1, &[]);
        read_execute(&mut stream, 1);
        write_packet(&mut stream, 1, &ok_body(1, 41, AUTOCOMMIT));
        expect_close(&mut stream, 1);
    });

    let mut client = strict_client(port);
    let id = client
        .insert("INSERT INTO users(name) VALUES(?)", &[&"ada"], None)
        .expect("insert");
    assert_eq!(id, 41);
    server.join().expect("server");
}

#[test]
fn insert_with_sequence_reads_the_named_sequence() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        serve_prepare(&mut stream, 1, "INSERT INTO users(name) VALUES(?)", 1, &[]);
        read_execute(&mut stream, 1);
        write_packet(&mut stream, 1, &ok_body(1, 0, AUTOCOMMIT));
        expect_close(&mut stream, 1);

        let lastval = [("lastval", 0x08, 63)];
        serve_prepare(&mut stream, 2, "SELECT LASTVAL(user_seq)", 0, &lastval);
        read_execute(&mut stream, 2);
        write_resultset(&mut stream, &lastval, &[vec![Cell::I64(77)]]);
        expect_close(&mut stream, 2);
    });

    let mut client = strict_client(port);
    let id = client
        .insert(
            "INSERT INTO users(name) VALUES(?)",
            &[&"ada"],
            Some("user_seq"),
        )
        .expect("insert");
    assert_eq!(id, 77);
    server.join().expect("server");
}

#[test]
fn fetch_table_returns_rows_in_order() {
    let columns = [("id", 0x08, 63), ("name", 0xfd, 45)];
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        serve_prepare(&mut stream, 1, "SELECT id, name FROM users", 0, &columns);
        read_execute(&mut stream, 1);
        write_resultset(
            &mut stream,
            &columns,
            &[
                vec![Cell::I64(1), Cell::Str("ada")],
                vec![Cell::I64(2), Cell::Str("grace")],
                vec![Cell::I64(3), Cell::Null],
            ],
        );
        expect_close(&mut stream, 1);
    });

    let mut client = strict_client(port);
    let rows = client
        .fetch_table("SELECT id, name FROM users", &[])
        .expect("fetch_table");
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0].column_names().collect::<Vec<_>>(),
        vec!["id", "name"]
    );
    assert_eq!(rows[0].get_by_name("name"), Some(&Value::Text("ada".to_string())));
    assert_eq!(rows[1].get(0), Some(&Value::Int(2)));
    assert_eq!(rows[2].get_by_name("name"), Some(&Value::Null));
    server.join().expect("server");
}

#[test]
fn fetch_row_returns_first_row_or_none() {
    let columns = [("id", 0x08, 63)];
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        serve_prepare(&mut stream, 1, "SELECT id FROM users", 0, &columns);
        read_execute(&mut stream, 1);
        write_resultset(
            &mut stream,
            &columns,
            &[vec![Cell::I64(7)], vec![Cell::I64(8)]],
        );
        expect_close(&mut stream, 1);

        serve_prepare(&mut stream, 2, "SELECT id FROM nobody", 0, &columns);
        read_execute(&mut stream, 2);
        write_resultset(&mut stream, &columns, &[]);
        expect_close(&mut stream, 2);
    });

    let mut client = strict_client(port);
    let row = client
        .fetch_row("SELECT id FROM users", &[])
        .expect("fetch_row")
        .expect("first row");
    assert_eq!(row.get_i64(0).expect("typed get"), Some(7));

    let none = client
        .fetch_row("SELECT id FROM nobody", &[])
        .expect("fetch_row");
    assert!(none.is_none());
    server.join().expect("server");
}

#[test]
fn fetch_column_flattens_first_column() {
    let columns = [("n", 0x08, 63)];
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        serve_prepare(&mut stream, 1, "SELECT n FROM seq", 0, &columns);
        read_execute(&mut stream, 1);
        write_resultset(
            &mut stream,
            &columns,
            &[vec![Cell::I64(10)], vec![Cell::I64(20)], vec![Cell::I64(30)]],
        );
        expect_close(&mut stream, 1);
    });

    let mut client = strict_client(port);
    let values = client
        .fetch_column("SELECT n FROM seq", &[])
        .expect("fetch_column");
    assert_eq!(values, vec![Value::Int(10), Value::Int(20), Value::Int(30)]);
    server.join().expect("server");
}

#[test]
fn fetch_cell_distinguishes_absence_from_empty_values() {
    let text_col = [("v", 0xfd, 45)];
    let int_col = [("v", 0x08, 63)];
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");

        serve_prepare(&mut stream, 1, "SELECT a FROM t", 0, &text_col);
        read_execute(&mut stream, 1);
        write_resultset(&mut stream, &text_col, &[vec![Cell::Null]]);
        expect_close(&mut stream, 1);

        serve_prepare(&mut stream, 2, "SELECT b FROM t", 0, &text_col);
        read_execute(&mut stream, 2);
        write_resultset(&mut stream, &text_col, &[vec![Cell::Str("")]]);
        expect_close(&mut stream, 2);

        serve_prepare(&mut stream, 3, "SELECT c FROM t", 0, &int_col);
        read_execute(&mut stream, 3);
        write_resultset(&mut stream, &int_col, &[vec![Cell::I64(0)]]);
        expect_close(&mut stream, 3);

        serve_prepare(&mut stream, 4, "SELECT d FROM t", 0, &int_col);
        read_execute(&mut stream, 4);
        write_resultset(&mut stream, &int_col, &[]);
        expect_close(&mut stream, 4);
    });

    let mut client = strict_client(port);

    // A NULL cell is present, distinguishable from a missing row.
    let null_cell = client.fetch_cell("SELECT a FROM t", &[]).expect("cell");
    assert_eq!(null_cell, Some(Value::Null));

    let empty = client.fetch_cell("SELECT b FROM t", &[]).expect("cell");
    assert_eq!(empty, Some(Value::Text(String::new())));

    let zero = client.fetch_cell("SELECT c FROM t", &[]).expect("cell");
    assert_eq!(zero, Some(Value::Int(0)));

    let missing = client.fetch_cell("SELECT d FROM t", &[]).expect("cell");
    assert_eq!(missing, None);

    // The legacy notion of absence conflates all four.
    for cell in [&null_cell, &empty, &zero] {
        assert!(cell.as_ref().is_some_and(Value::is_empty_equivalent));
    }
    server.join().expect("server");
}

#[test]
fn prepare_failure_is_a_distinct_error() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        let (seq, packet) = read_packet(&mut stream);
        assert_eq!(seq, 0);
        assert_eq!(packet[0], 0x16);
        write_packet(
            &mut stream,
            1,
            &err_body(1064, "42000", "You have an error in your SQL syntax"),
        );

        // the connection itself survives a failed prepare
        serve_prepare(&mut stream, 1, "DELETE FROM t", 0, &[]);
        read_execute(&mut stream, 1);
        write_packet(&mut stream, 1, &ok_body(2, 0, AUTOCOMMIT));
        expect_close(&mut stream, 1);
    });

    let mut client = strict_client(port);
    let err = client
        .fetch_table("SELEC broken", &[])
        .expect_err("prepare must fail");
    match err {
        Error::Prepare { code, state, .. } => {
            assert_eq!(code, 1064);
            assert_eq!(state, "42000");
        }
        other => panic!("expected a prepare error, got {other:?}"),
    }

    assert_eq!(client.execute("DELETE FROM t", &[]).expect("execute"), 2);
    server.join().expect("server");
}

#[test]
fn execution_failure_surfaces_server_error() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        serve_prepare(&mut stream, 1, "INSERT INTO users(email) VALUES(?)", 1, &[]);
        read_execute(&mut stream, 1);
        write_packet(
            &mut stream,
            1,
            &err_body(1062, "23000", "Duplicate entry 'ada@x' for key 'email'"),
        );
        // the statement is still closed after a failed execute
        expect_close(&mut stream, 1);
    });

    let mut client = strict_client(port);
    let err = client
        .insert("INSERT INTO users(email) VALUES(?)", &[&"ada@x"], None)
        .expect_err("duplicate key must fail");
    assert!(err.is_server_error());
    assert_eq!(err.server_code(), Some(1062));
    match err {
        Error::Server { code, state, message } => {
            assert_eq!(code, 1062);
            assert_eq!(state, "23000");
            assert!(message.contains("Duplicate entry"), "got: {message}");
        }
        other => panic!("expected a server error, got {other:?}"),
    }
    server.join().expect("server");
}

#[test]
fn log_and_continue_swallows_prepare_failure() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        let (_, packet) = read_packet(&mut stream);
        assert_eq!(packet[0], 0x16);
        write_packet(
            &mut stream,
            1,
            &err_body(1064, "42000", "You have an error in your SQL syntax"),
        );
    });

    let sink = Arc::new(CaptureSink::default());
    let mut client = Client::new(
        test_config(port),
        sink.clone(),
        ErrorPolicy::LogAndContinue,
    );
    let rows = client.fetch_table("SELEC broken", &[]).expect("swallowed");
    assert!(rows.is_empty());

    let lines = sink.lines.lock().expect("sink lock");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("prepare failed 1064"), "got: {}", lines[0]);
    server.join().expect("server");
}

#[test]
fn reconnects_after_close() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let first = auth_session(&listener, "app", "", "demo");
        drop(first);

        let mut stream = auth_session(&listener, "app", "", "demo");
        serve_prepare(&mut stream, 7, "DELETE FROM t", 0, &[]);
        read_execute(&mut stream, 7);
        write_packet(&mut stream, 1, &ok_body(1, 0, AUTOCOMMIT));
        expect_close(&mut stream, 7);
    });

    let mut client = strict_client(port);
    assert!(client.is_connected());

    client.close();
    assert!(!client.is_connected());

    // the next operation reconnects before running
    let affected = client.execute("DELETE FROM t", &[]).expect("execute");
    assert_eq!(affected, 1);
    assert!(client.is_connected());
    server.join().expect("server");
}

#[test]
fn transactions_follow_server_status() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        for (expected, status) in [
            ("BEGIN", AUTOCOMMIT | IN_TRANS),
            ("COMMIT", AUTOCOMMIT),
            ("BEGIN", AUTOCOMMIT | IN_TRANS),
            ("ROLLBACK", AUTOCOMMIT),
        ] {
            let (seq, packet) = read_packet(&mut stream);
            assert_eq!(seq, 0);
            assert_eq!(packet[0], 0x03);
            assert_eq!(&packet[1..], expected.as_bytes());
            write_packet(&mut stream, 1, &ok_body(0, 0, status));
        }
    });

    let mut client = strict_client(port);
    assert!(!client.in_transaction());

    client.begin_transaction().expect("begin");
    assert!(client.in_transaction());
    client.commit().expect("commit");
    assert!(!client.in_transaction());

    client.begin_transaction().expect("begin");
    assert!(client.in_transaction());
    client.rollback().expect("rollback");
    assert!(!client.in_transaction());
    server.join().expect("server");
}

#[test]
fn ping_round_trip() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        let (seq, packet) = read_packet(&mut stream);
        assert_eq!(seq, 0);
        assert_eq!(packet, vec![0x0e]);
        write_packet(&mut stream, 1, &ok_body(0, 0, AUTOCOMMIT));
    });

    let mut client = strict_client(port);
    client.ping().expect("ping");
    assert_eq!(client.server_version(), Some("8.0.36-mock"));
    assert_eq!(client.connection_id(), Some(42));
    server.join().expect("server");
}

#[test]
fn select_database_switches_schema() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let mut stream = auth_session(&listener, "app", "", "demo");
        let (seq, packet) = read_packet(&mut stream);
        assert_eq!(seq, 0);
        assert_eq!(packet[0], 0x02, "expected COM_INIT_DB");
        assert_eq!(&packet[1..], b"analytics");
        write_packet(&mut stream, 1, &ok_body(0, 0, AUTOCOMMIT));
    });

    let mut conn = Connection::connect(&test_config(port)).expect("connect");
    conn.select_database("analytics").expect("init db");
    server.join().expect("server");
}

#[test]
fn auth_token_answers_the_server_challenge() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let stream = auth_session(&listener, "app", "s3cret", "demo");
        drop(stream);
    });

    let config = Config::new("127.0.0.1", port, "app", "s3cret", "demo");
    let client = Client::new(config, Arc::new(NullSink), ErrorPolicy::Strict);
    assert!(client.is_connected());
    server.join().expect("server");
}

#[test]
fn auth_switch_rescrambles_with_the_new_nonce() {
    let fresh: [u8; 20] = [
        21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40,
    ];
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        write_packet(&mut stream, 0, &greeting());
        let (seq, _) = read_packet(&mut stream);
        assert_eq!(seq, 1);

        // ask the client to redo the scramble against a fresh challenge
        let mut switch = vec![0xfe];
        switch.extend_from_slice(b"mysql_native_password\0");
        switch.extend_from_slice(&fresh);
        switch.push(0);
        write_packet(&mut stream, 2, &switch);

        let (seq, token) = read_packet(&mut stream);
        assert_eq!(seq, 3, "switch response must continue the sequence");
        assert_eq!(token, auth::native_password_scramble("s3cret", &fresh));
        write_packet(&mut stream, 4, &ok_body(0, 0, AUTOCOMMIT));

        let (seq, query) = read_packet(&mut stream);
        assert_eq!(seq, 0);
        assert_eq!(&query[1..], b"SET NAMES utf8");
        write_packet(&mut stream, 1, &ok_body(0, 0, AUTOCOMMIT));
    });

    let config = Config::new("127.0.0.1", port, "app", "s3cret", "demo");
    let conn = Connection::connect(&config).expect("connect");
    assert!(conn.is_ready());
    server.join().expect("server");
}

#[test]
fn truncated_auth_switch_fails_cleanly() {
    let (listener, port) = listen();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        write_packet(&mut stream, 0, &greeting());
        let (seq, _) = read_packet(&mut stream);
        assert_eq!(seq, 1);
        // a plugin name with no NUL terminator and no challenge after it
        write_packet(&mut stream, 2, &[0xfe, b'x']);
    });

    let err = Connection::connect(&test_config(port)).expect_err("malformed switch");
    assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
    server.join().expect("server");
}
