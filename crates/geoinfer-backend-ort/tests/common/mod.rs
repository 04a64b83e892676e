#![allow(dead_code)]

use geoinfer_core::Graph;

/// Minimal protobuf writer, enough to spell out a small ONNX model.
#[derive(Default)]
struct Proto(Vec<u8>);

impl Proto {
    fn varint(mut self, field: u32, value: u64) -> Self {
        push_varint(&mut self.0, u64::from(field) << 3);
        push_varint(&mut self.0, value);
        self
    }

    fn bytes(mut self, field: u32, data: &[u8]) -> Self {
        push_varint(&mut self.0, u64::from(field) << 3 | 2);
        push_varint(&mut self.0, data.len() as u64);
        self.0.extend_from_slice(data);
        self
    }

    fn string(self, field: u32, s: &str) -> Self {
        self.bytes(field, s.as_bytes())
    }

    fn message(self, field: u32, m: Proto) -> Self {
        self.bytes(field, &m.0)
    }
}

fn push_varint(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v & 0x7f) as u8 | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

const FLOAT: u64 = 1;

/// f32 tensor of shape `[n, 2]`.
fn value_info(name: &str) -> Proto {
    let shape = Proto::default()
        .message(1, Proto::default().string(2, "n"))
        .message(1, Proto::default().varint(1, 2));
    let tensor = Proto::default().varint(1, FLOAT).message(2, shape);
    Proto::default()
        .string(1, name)
        .message(2, Proto::default().message(1, tensor))
}

fn node(op: &str, input: &str, output: &str) -> Proto {
    Proto::default()
        .string(1, input)
        .string(2, output)
        .string(3, output)
        .string(4, op)
}

/// Graph with one input `x: f32[n, 2]` and two outputs declared in the order
/// `same = Identity(x)`, `negated = Neg(x)`.
pub fn pair_graph() -> Graph {
    let graph = Proto::default()
        .message(1, node("Identity", "x", "same"))
        .message(1, node("Neg", "x", "negated"))
        .string(2, "pair")
        .message(11, value_info("x"))
        .message(12, value_info("same"))
        .message(12, value_info("negated"));
    let model = Proto::default()
        .varint(1, 8)
        .string(2, "geoinfer-tests")
        .message(7, graph)
        .message(8, Proto::default().string(1, "").varint(2, 13));
    Graph::from_bytes("pair.onnx", model.0)
}
