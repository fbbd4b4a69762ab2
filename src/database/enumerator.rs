//! Filtered enumeration of networks and autonomous systems.
//!
//! [`NetworkEnumerator`] walks the flattened tree depth-first with an
//! explicit stack and yields one matching network per call to `next()`.
//! It holds mutable traversal state, so each thread needs its own.

use log::debug;

use super::codec::{AsView, RecordView, TreeView};
use crate::address::{Address, AddressFamily, ADDRESS_BITS};
use crate::autonomous_system::AutonomousSystem;
use crate::country::CountryCode;
use crate::network::{Network, NetworkFlags};
use crate::stringpool::StringPool;
use crate::{Error, Result};

/// Criteria a network must meet to be yielded. Unset criteria match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkFilter {
    country_code: Option<CountryCode>,
    asn: Option<u32>,
    flags: NetworkFlags,
    family: Option<AddressFamily>,
}

impl NetworkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only networks located in `code`.
    ///
    /// `A1`, `A2` and `A3` select anonymous proxies, satellite providers and
    /// anycast networks instead.
    pub fn country_code(mut self, code: &str) -> Result<Self> {
        match NetworkFlags::from_pseudo_country(code) {
            Some(flag) => self.flags |= flag,
            None => self.country_code = Some(CountryCode::new(code)?),
        }
        Ok(self)
    }

    /// Only networks announced by `asn`.
    pub fn asn(mut self, asn: u32) -> Self {
        self.asn = Some(asn);
        self
    }

    /// Only networks carrying at least one of `flags`.
    pub fn flags(mut self, flags: NetworkFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Only networks of `family`.
    pub fn family(mut self, family: AddressFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn matches(&self, network: &Network) -> bool {
        if let Some(country) = self.country_code {
            if network.country_code() != Some(country) {
                return false;
            }
        }
        if let Some(asn) = self.asn {
            if !network.matches_asn(asn) {
                return false;
            }
        }
        if !self.flags.is_empty() && !network.flags().intersects(self.flags) {
            return false;
        }
        if let Some(family) = self.family {
            if network.family() != family {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: u32,
    bit: bool,
    depth: u8,
}

/// Resumable depth-first enumeration of the networks in a database.
///
/// Networks come out in pre-order: a network before its subnets, and the
/// zero branch before the one branch.
pub struct NetworkEnumerator<'a> {
    tree: TreeView<'a>,
    records: RecordView<'a>,
    filter: NetworkFilter,
    stack: Vec<Frame>,
    visited: Vec<u64>,
    address: Address,
    done: bool,
}

impl<'a> NetworkEnumerator<'a> {
    pub(crate) fn new(tree: TreeView<'a>, records: RecordView<'a>, filter: NetworkFilter) -> Self {
        let mut stack = Vec::with_capacity(ADDRESS_BITS as usize + 1);
        if !tree.is_empty() {
            stack.push(Frame {
                node: 0,
                bit: false,
                depth: 0,
            });
        }

        Self {
            visited: vec![0; tree.len().div_ceil(64)],
            tree,
            records,
            filter,
            stack,
            address: Address::UNSPECIFIED,
            done: false,
        }
    }

    /// Mark `node` as visited and report whether it was visited before.
    fn check_visited(&mut self, node: u32) -> bool {
        let (word, bit) = (node as usize / 64, node as usize % 64);
        let seen = self.visited[word] & (1 << bit) != 0;
        self.visited[word] |= 1 << bit;
        seen
    }

    fn finish(&mut self) {
        self.done = true;
        self.stack.clear();
        self.visited.iter_mut().for_each(|w| *w = 0);
    }

    fn fail(&mut self, error: Error) -> Option<Result<Network>> {
        self.finish();
        Some(Err(error))
    }

    fn step(&mut self, frame: Frame) -> Result<Option<Network>> {
        let node = self.tree.node(frame.node)?;
        if frame.depth > 0 {
            self.address.set_bit(frame.depth - 1, frame.bit);
        }

        for bit in [true, false] {
            if let Some(child) = node.child(bit) {
                if frame.depth >= ADDRESS_BITS {
                    return Err(Error::CorruptTree(format!(
                        "node {} has children below {} bits",
                        frame.node, ADDRESS_BITS
                    )));
                }
                self.stack.push(Frame {
                    node: child,
                    bit,
                    depth: frame.depth + 1,
                });
            }
        }

        let Some(record) = node.record() else {
            return Ok(None);
        };
        let entry = self.records.get(record)?;
        let network = entry.apply(Network::from_tree_path(self.address, frame.depth));
        Ok(self.filter.matches(&network).then_some(network))
    }
}

impl<'a> Iterator for NetworkEnumerator<'a> {
    type Item = Result<Network>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(frame) = self.stack.pop() {
            if frame.node as usize >= self.tree.len() {
                return self.fail(Error::CorruptTree(format!(
                    "node {} out of range ({} nodes)",
                    frame.node,
                    self.tree.len()
                )));
            }
            if self.check_visited(frame.node) {
                continue;
            }

            match self.step(frame) {
                Ok(Some(network)) => return Some(Ok(network)),
                Ok(None) => continue,
                Err(e) => return self.fail(e),
            }
        }

        debug!("Network enumeration exhausted");
        self.finish();
        None
    }
}

/// Enumeration of autonomous systems whose name contains a substring.
pub struct AsEnumerator<'a> {
    view: AsView<'a>,
    pool: StringPool<'a>,
    needle: String,
    position: usize,
}

impl<'a> AsEnumerator<'a> {
    pub(crate) fn new(view: AsView<'a>, pool: StringPool<'a>, name: &str) -> Self {
        Self {
            view,
            pool,
            needle: name.to_string(),
            position: 0,
        }
    }
}

impl<'a> Iterator for AsEnumerator<'a> {
    type Item = Result<AutonomousSystem>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(entry) = self.view.get(self.position) {
            self.position += 1;

            let name = match self.pool.get(entry.name) {
                Ok(name) => name,
                Err(e) => {
                    self.position = self.view.len();
                    return Some(Err(e));
                }
            };
            let autonomous_system = AutonomousSystem::new(entry.number, name);
            if autonomous_system.name_contains(&self.needle) {
                return Some(Ok(autonomous_system));
            }
        }
        None
    }
}
