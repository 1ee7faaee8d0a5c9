//! Huffman decoding of big-value pairs and count1 quadruples.

use std::sync::LazyLock;

use crate::bits::BitReader;
use crate::codes::*;
use crate::error::Mp3Error;

const LINBITS: [u32; 32] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 6, 8, 10, 13, 4, 5, 6, 7, 8, 9,
    11, 13,
];

#[derive(Clone, Copy, Debug)]
enum Link {
    Empty,
    Node(usize),
    Leaf(u8),
}

/// Binary decoding tree; node 0 is the root.
#[derive(Debug)]
struct Tree {
    nodes: Vec<[Link; 2]>,
}

impl Tree {
    /// Builds a tree where the code at index `i` decodes to `value(i)`.
    fn build(codes: &[(u32, u8)], value: impl Fn(usize) -> u8) -> Self {
        let mut nodes = vec![[Link::Empty; 2]];
        for (i, &(code, len)) in codes.iter().enumerate() {
            let mut node = 0;
            for depth in (0..len).rev() {
                let branch = ((code >> depth) & 1) as usize;
                if depth == 0 {
                    nodes[node][branch] = Link::Leaf(value(i));
                    break;
                }
                node = match nodes[node][branch] {
                    Link::Node(next) => next,
                    _ => {
                        nodes.push([Link::Empty; 2]);
                        let next = nodes.len() - 1;
                        nodes[node][branch] = Link::Node(next);
                        next
                    }
                };
            }
        }
        Self { nodes }
    }

    fn decode(&self, r: &mut BitReader<'_>) -> Option<u8> {
        let mut node = 0;
        loop {
            match self.nodes[node][usize::from(r.bit())] {
                Link::Node(next) => node = next,
                Link::Leaf(value) => return Some(value),
                Link::Empty => return None,
            }
        }
    }
}

/// Distinct pair codebooks with their row width.
static BOOKS: [(&[(u32, u8)], usize); 15] = [
    (&PAIRS_1, 2),
    (&PAIRS_2, 3),
    (&PAIRS_3, 3),
    (&PAIRS_5, 4),
    (&PAIRS_6, 4),
    (&PAIRS_7, 6),
    (&PAIRS_8, 6),
    (&PAIRS_9, 6),
    (&PAIRS_10, 8),
    (&PAIRS_11, 8),
    (&PAIRS_12, 8),
    (&PAIRS_13, 16),
    (&PAIRS_15, 16),
    (&PAIRS_16, 16),
    (&PAIRS_24, 16),
];

static PAIR_TREES: LazyLock<Vec<Tree>> = LazyLock::new(|| {
    BOOKS
        .iter()
        .map(|&(codes, wrap)| Tree::build(codes, |i| (((i / wrap) << 4) | (i % wrap)) as u8))
        .collect()
});

static QUAD_TREES: LazyLock<[Tree; 2]> = LazyLock::new(|| {
    let b: Vec<(u32, u8)> = (0..16).map(|i| (15 - i, 4)).collect();
    [
        Tree::build(&QUADS_A, |i| i as u8),
        Tree::build(&b, |i| i as u8),
    ]
});

/// Index into [`BOOKS`] for a big-values table, `None` for the tables
/// that code nothing.
fn book(table: usize) -> Option<usize> {
    Some(match table {
        1 => 0,
        2 => 1,
        3 => 2,
        5 => 3,
        6 => 4,
        7 => 5,
        8 => 6,
        9 => 7,
        10 => 8,
        11 => 9,
        12 => 10,
        13 => 11,
        15 => 12,
        16..=23 => 13,
        24..=31 => 14,
        _ => return None,
    })
}

fn signed(r: &mut BitReader<'_>, magnitude: i32) -> i32 {
    if magnitude != 0 && r.bit() { -magnitude } else { magnitude }
}

/// Decodes one pair of big-value frequency lines with table `table`.
pub(crate) fn decode_pair(r: &mut BitReader<'_>, table: usize) -> Result<(i32, i32), Mp3Error> {
    let Some(book) = book(table) else {
        return Ok((0, 0));
    };
    let value = PAIR_TREES[book].decode(r).ok_or(Mp3Error::Huffman(table))?;
    let linbits = LINBITS[table];
    let mut x = i32::from(value >> 4);
    if linbits > 0 && x == 15 {
        x += r.bits(linbits) as i32;
    }
    let x = signed(r, x);
    let mut y = i32::from(value & 0xf);
    if linbits > 0 && y == 15 {
        y += r.bits(linbits) as i32;
    }
    let y = signed(r, y);
    Ok((x, y))
}

/// Decodes one count1 quadruple `(v, w, x, y)`; `table_b` selects the
/// fixed-length table.
pub(crate) fn decode_quad(r: &mut BitReader<'_>, table_b: bool) -> Result<[i32; 4], Mp3Error> {
    let value = QUAD_TREES[usize::from(table_b)]
        .decode(r)
        .ok_or(Mp3Error::Huffman(32 + usize::from(table_b)))?;
    let mut quad = [0; 4];
    for (i, line) in quad.iter_mut().enumerate() {
        *line = signed(r, i32::from((value >> (3 - i)) & 1));
    }
    Ok(quad)
}
