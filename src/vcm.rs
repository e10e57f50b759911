//! C4: the VCM (Virtual Conditional Model) node tree.
//!
//! An arena-backed, index-linked tree (spec §9: "In languages with strong
//! ownership, prefer an arena... represent links as indices. Release is a
//! single reset of the arena on parse failure."). Every node carries a tag
//! discriminant plus payload, and four links: parent, first/last child,
//! and a sibling chain.

use ordered_float::OrderedFloat;

/// An index into a [`Vcm`] arena. Never valid across different arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VcmId(u32);

impl VcmId {
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Bookkeeping bits carried alongside a node's payload (spec §3.4:
/// `extra` bitfield).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extra(u8);

impl Extra {
    pub const PROTECT: Extra = Extra(0b01);
    pub const SUGAR: Extra = Extra(0b10);

    pub fn contains(self, flag: Extra) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(&mut self, flag: Extra) {
        self.0 |= flag.0;
    }

    pub fn toggle(&mut self, flag: Extra) {
        self.0 ^= flag.0;
    }
}

impl std::ops::BitOr for Extra {
    type Output = Extra;
    fn bitor(self, rhs: Extra) -> Extra {
        Extra(self.0 | rhs.0)
    }
}

/// The tag discriminant named in spec §3.4, independent of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcmTag {
    Null,
    Boolean,
    Number,
    LongInt,
    ULongInt,
    LongDouble,
    String,
    ByteSequence,
    Array,
    Object,
    ConcatString,
    GetVariable,
    GetElement,
    CallGetter,
    CallSetter,
}

/// The scalar payload (or lack of one) each tag carries.
#[derive(Debug, Clone, PartialEq)]
pub enum VcmPayload {
    Null,
    Boolean(bool),
    Number(OrderedFloat<f64>),
    LongInt(i64),
    ULongInt(u64),
    LongDouble(OrderedFloat<f64>),
    String(Vec<u8>),
    ByteSequence(Vec<u8>),
    /// Empty-payload container/operator variants; children carry the
    /// meaning.
    Array,
    Object,
    ConcatString,
    GetVariable,
    GetElement,
    CallGetter,
    CallSetter,
}

impl VcmPayload {
    pub fn tag(&self) -> VcmTag {
        match self {
            VcmPayload::Null => VcmTag::Null,
            VcmPayload::Boolean(_) => VcmTag::Boolean,
            VcmPayload::Number(_) => VcmTag::Number,
            VcmPayload::LongInt(_) => VcmTag::LongInt,
            VcmPayload::ULongInt(_) => VcmTag::ULongInt,
            VcmPayload::LongDouble(_) => VcmTag::LongDouble,
            VcmPayload::String(_) => VcmTag::String,
            VcmPayload::ByteSequence(_) => VcmTag::ByteSequence,
            VcmPayload::Array => VcmTag::Array,
            VcmPayload::Object => VcmTag::Object,
            VcmPayload::ConcatString => VcmTag::ConcatString,
            VcmPayload::GetVariable => VcmTag::GetVariable,
            VcmPayload::GetElement => VcmTag::GetElement,
            VcmPayload::CallGetter => VcmTag::CallGetter,
            VcmPayload::CallSetter => VcmTag::CallSetter,
        }
    }
}

#[derive(Debug, Clone)]
struct VcmNodeData {
    payload: VcmPayload,
    extra: Extra,
    parent: Option<VcmId>,
    first_child: Option<VcmId>,
    last_child: Option<VcmId>,
    prev_sibling: Option<VcmId>,
    next_sibling: Option<VcmId>,
    nr_children: u32,
}

/// The arena that owns every node created during one parse.
///
/// On a failed parse the caller simply drops the `Vcm` (or the `Parser`
/// that owns it gets `reset`); there is no manual post-order free to write,
/// because the arena's `Vec` drop already frees every node, and node
/// payloads hold no external resources that need ordered teardown.
#[derive(Debug, Clone, Default)]
pub struct Vcm {
    nodes: Vec<VcmNodeData>,
}

impl Vcm {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, payload: VcmPayload) -> VcmId {
        self.nodes.push(VcmNodeData {
            payload,
            extra: Extra::default(),
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            nr_children: 0,
        });
        VcmId((self.nodes.len() - 1) as u32)
    }

    pub fn new_null(&mut self) -> VcmId {
        self.push(VcmPayload::Null)
    }
    pub fn new_boolean(&mut self, b: bool) -> VcmId {
        self.push(VcmPayload::Boolean(b))
    }
    pub fn new_number(&mut self, d: f64) -> VcmId {
        self.push(VcmPayload::Number(OrderedFloat(d)))
    }
    pub fn new_long_int(&mut self, i: i64) -> VcmId {
        self.push(VcmPayload::LongInt(i))
    }
    pub fn new_u_long_int(&mut self, u: u64) -> VcmId {
        self.push(VcmPayload::ULongInt(u))
    }
    pub fn new_long_double(&mut self, ld: f64) -> VcmId {
        self.push(VcmPayload::LongDouble(OrderedFloat(ld)))
    }
    pub fn new_string(&mut self, bytes: Vec<u8>) -> VcmId {
        self.push(VcmPayload::String(bytes))
    }
    pub fn new_byte_sequence(&mut self, bytes: Vec<u8>) -> VcmId {
        self.push(VcmPayload::ByteSequence(bytes))
    }
    pub fn new_array(&mut self) -> VcmId {
        self.push(VcmPayload::Array)
    }
    pub fn new_object(&mut self) -> VcmId {
        self.push(VcmPayload::Object)
    }
    pub fn new_concat_string(&mut self) -> VcmId {
        self.push(VcmPayload::ConcatString)
    }
    pub fn new_get_variable(&mut self) -> VcmId {
        self.push(VcmPayload::GetVariable)
    }
    pub fn new_get_element(&mut self) -> VcmId {
        self.push(VcmPayload::GetElement)
    }
    pub fn new_call_getter(&mut self) -> VcmId {
        self.push(VcmPayload::CallGetter)
    }
    pub fn new_call_setter(&mut self) -> VcmId {
        self.push(VcmPayload::CallSetter)
    }

    pub fn tag(&self, id: VcmId) -> VcmTag {
        self.nodes[id.idx()].payload.tag()
    }

    pub fn payload(&self, id: VcmId) -> &VcmPayload {
        &self.nodes[id.idx()].payload
    }

    pub fn extra(&self, id: VcmId) -> Extra {
        self.nodes[id.idx()].extra
    }

    pub fn set_extra(&mut self, id: VcmId, flag: Extra) {
        self.nodes[id.idx()].extra.set(flag);
    }

    pub fn toggle_extra(&mut self, id: VcmId, flag: Extra) {
        self.nodes[id.idx()].extra.toggle(flag);
    }

    pub fn parent(&self, id: VcmId) -> Option<VcmId> {
        self.nodes[id.idx()].parent
    }

    pub fn first_child(&self, id: VcmId) -> Option<VcmId> {
        self.nodes[id.idx()].first_child
    }

    pub fn next_sibling(&self, id: VcmId) -> Option<VcmId> {
        self.nodes[id.idx()].next_sibling
    }

    pub fn prev_sibling(&self, id: VcmId) -> Option<VcmId> {
        self.nodes[id.idx()].prev_sibling
    }

    pub fn children_count(&self, id: VcmId) -> usize {
        self.nodes[id.idx()].nr_children as usize
    }

    pub fn children(&self, id: VcmId) -> Children<'_> {
        Children {
            vcm: self,
            next: self.nodes[id.idx()].first_child,
        }
    }

    /// Detaches `old` from `parent`'s child chain and splices `new` into
    /// the same slot, preserving sibling order, then makes `old` parentless
    /// (the caller is expected to immediately re-attach it as a child of
    /// `new`). Used when a JSONEE chain step (`.x`, `[i]`, a getter/setter
    /// call) wraps an already-placed value in a new operator node.
    pub(crate) fn replace_child(&mut self, parent: VcmId, old: VcmId, new: VcmId) {
        let prev = self.nodes[old.idx()].prev_sibling;
        let next = self.nodes[old.idx()].next_sibling;
        match prev {
            Some(p) => self.nodes[p.idx()].next_sibling = Some(new),
            None => self.nodes[parent.idx()].first_child = Some(new),
        }
        match next {
            Some(n) => self.nodes[n.idx()].prev_sibling = Some(new),
            None => self.nodes[parent.idx()].last_child = Some(new),
        }
        self.nodes[new.idx()].prev_sibling = prev;
        self.nodes[new.idx()].next_sibling = next;
        self.nodes[new.idx()].parent = Some(parent);
        self.nodes[old.idx()].parent = None;
        self.nodes[old.idx()].prev_sibling = None;
        self.nodes[old.idx()].next_sibling = None;
    }

    /// Appends `child` as the last child of `parent`. O(1): the parent
    /// tracks its own last child so this never walks the sibling chain.
    pub fn append_child(&mut self, parent: VcmId, child: VcmId) {
        debug_assert!(self.nodes[child.idx()].parent.is_none());
        self.nodes[child.idx()].parent = Some(parent);
        let prev_last = self.nodes[parent.idx()].last_child;
        self.nodes[child.idx()].prev_sibling = prev_last;
        match prev_last {
            Some(last) => self.nodes[last.idx()].next_sibling = Some(child),
            None => self.nodes[parent.idx()].first_child = Some(child),
        }
        self.nodes[parent.idx()].last_child = Some(child);
        self.nodes[parent.idx()].nr_children += 1;
    }
}

/// Forward iterator over a node's children via the sibling chain.
pub struct Children<'a> {
    vcm: &'a Vcm,
    next: Option<VcmId>,
}

impl Iterator for Children<'_> {
    type Item = VcmId;

    fn next(&mut self) -> Option<VcmId> {
        let current = self.next?;
        self.next = self.vcm.next_sibling(current);
        Some(current)
    }
}

/// The output of a successful parse: an arena plus the id of its root.
///
/// Evaluating a `VcmTree` (resolving `GET_VARIABLE`/`GET_ELEMENT`/
/// `CALL_GETTER`/`CALL_SETTER` nodes against live data) is out of scope
/// for this crate. An evaluator walking this tree would need, at minimum,
/// a `(name: &str, user_data) -> Value` variable-lookup callback and a way
/// to silence "undefined variable" errors versus treating them as fatal —
/// this type carries no such hooks itself.
#[derive(Debug, Clone)]
pub struct VcmTree {
    vcm: Vcm,
    root: VcmId,
}

impl VcmTree {
    pub(crate) fn new(vcm: Vcm, root: VcmId) -> Self {
        Self { vcm, root }
    }

    pub fn root(&self) -> VcmRef<'_> {
        VcmRef {
            vcm: &self.vcm,
            id: self.root,
        }
    }
}

/// A read-only handle to one node in a [`VcmTree`], for the evaluator side
/// (spec §6.4). No mutation is exposed outside this crate.
#[derive(Clone, Copy)]
pub struct VcmRef<'a> {
    vcm: &'a Vcm,
    id: VcmId,
}

impl<'a> VcmRef<'a> {
    pub fn tag(&self) -> VcmTag {
        self.vcm.tag(self.id)
    }

    pub fn payload(&self) -> &'a VcmPayload {
        self.vcm.payload(self.id)
    }

    pub fn children(&self) -> impl Iterator<Item = VcmRef<'a>> + 'a {
        let vcm = self.vcm;
        self.vcm.children(self.id).map(move |id| VcmRef { vcm, id })
    }

    pub fn children_count(&self) -> usize {
        self.vcm.children_count(self.id)
    }

    pub fn extra(&self) -> Extra {
        self.vcm.extra(self.id)
    }
}

impl std::fmt::Debug for VcmRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn write_node(node: VcmRef<'_>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match node.payload() {
                VcmPayload::Null => write!(f, "NULL"),
                VcmPayload::Boolean(b) => write!(f, "BOOLEAN({b})"),
                VcmPayload::Number(n) => write!(f, "NUMBER({n})"),
                VcmPayload::LongInt(i) => write!(f, "LONG_INT({i})"),
                VcmPayload::ULongInt(u) => write!(f, "U_LONG_INT({u})"),
                VcmPayload::LongDouble(n) => write!(f, "LONG_DOUBLE({n})"),
                VcmPayload::String(bytes) => {
                    write!(f, "STRING({:?})", String::from_utf8_lossy(bytes))
                }
                VcmPayload::ByteSequence(bytes) => write!(f, "BYTE_SEQUENCE({bytes:?})"),
                other => {
                    let name = match other {
                        VcmPayload::Array => "ARRAY",
                        VcmPayload::Object => "OBJECT",
                        VcmPayload::ConcatString => "CONCAT_STRING",
                        VcmPayload::GetVariable => "GET_VARIABLE",
                        VcmPayload::GetElement => "GET_ELEMENT",
                        VcmPayload::CallGetter => "CALL_GETTER",
                        VcmPayload::CallSetter => "CALL_SETTER",
                        _ => unreachable!(),
                    };
                    write!(f, "{name}[")?;
                    for (i, child) in node.children().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write_node(child, f)?;
                    }
                    write!(f, "]")
                }
            }
        }
        write_node(*self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_child_is_o1_and_preserves_order() {
        let mut vcm = Vcm::new();
        let arr = vcm.new_array();
        let a = vcm.new_number(1.0);
        let b = vcm.new_number(2.0);
        let c = vcm.new_number(3.0);
        vcm.append_child(arr, a);
        vcm.append_child(arr, b);
        vcm.append_child(arr, c);
        assert_eq!(vcm.children_count(arr), 3);
        let order: Vec<_> = vcm.children(arr).collect();
        assert_eq!(order, vec![a, b, c]);
        assert_eq!(vcm.parent(b), Some(arr));
        assert_eq!(vcm.prev_sibling(b), Some(a));
        assert_eq!(vcm.next_sibling(b), Some(c));
    }

    #[test]
    fn replace_child_preserves_sibling_order_and_reparents() {
        let mut vcm = Vcm::new();
        let arr = vcm.new_array();
        let a = vcm.new_number(1.0);
        let b = vcm.new_number(2.0);
        let c = vcm.new_number(3.0);
        vcm.append_child(arr, a);
        vcm.append_child(arr, b);
        vcm.append_child(arr, c);

        let wrapper = vcm.new_get_element();
        vcm.replace_child(arr, b, wrapper);
        vcm.append_child(wrapper, b);

        let order: Vec<_> = vcm.children(arr).collect();
        assert_eq!(order, vec![a, wrapper, c]);
        assert_eq!(vcm.parent(b), Some(wrapper));
        assert_eq!(vcm.children(wrapper).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn debug_render_matches_s_expression_shape() {
        let mut vcm = Vcm::new();
        let arr = vcm.new_array();
        let a = vcm.new_number(1.0);
        vcm.append_child(arr, a);
        let tree = VcmTree::new(vcm, arr);
        assert_eq!(format!("{:?}", tree.root()), "ARRAY[NUMBER(1)]");
    }
}
