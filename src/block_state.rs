use quartz_nbt::{NbtCompound, NbtTag};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

/// Qualify a block name with the `minecraft:` namespace if it has none.
pub fn qualify(name: &str) -> SmolStr {
    if name.contains(':') {
        SmolStr::new(name)
    } else {
        SmolStr::new(format!("minecraft:{}", name))
    }
}

/// Strip a leading `minecraft:` namespace, leaving other namespaces intact.
pub fn base_form(name: &str) -> &str {
    name.strip_prefix("minecraft:").unwrap_or(name)
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed block state at byte {pos}: {message}")]
pub struct StateParseError {
    pub pos: usize,
    pub message: String,
}

/// A typed block-state property value.
///
/// Type mismatches between two values under the same key count as different,
/// never as missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropValue {
    Bool(bool),
    Int(i32),
    Str(SmolStr),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Bool(b) => write!(f, "{}", b),
            PropValue::Int(i) => write!(f, "{}", i),
            PropValue::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<i32> for PropValue {
    fn from(i: i32) -> Self {
        PropValue::Int(i)
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.into())
    }
}

/// Per-key comparison counts between an anchor property set and a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    /// Key present in both with an equal typed value.
    pub same: u32,
    /// Key present in both with unequal values, type mismatches included.
    pub different: u32,
    /// Key in the anchor, absent from the query.
    pub redundant: u32,
    /// Key in the query, absent from the anchor.
    pub missing: u32,
}

impl MatchScore {
    pub fn mismatch(&self) -> u32 {
        self.different + self.redundant + self.missing
    }

    /// Strict lexicographic ordering: larger `same` first, then smaller
    /// mismatch total. Ties are NOT beaten, so the earliest candidate wins.
    pub fn beats(&self, other: &MatchScore) -> bool {
        self.same > other.same || (self.same == other.same && self.mismatch() < other.mismatch())
    }
}

/// A key-sorted set of typed properties with a canonical textual rendering.
///
/// Two property sets render identically iff they are equal, which makes the
/// rendering usable as an exact-lookup hash key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropsForSearch {
    props: Vec<(SmolStr, PropValue)>,
}

impl PropsForSearch {
    pub fn new() -> Self {
        PropsForSearch { props: Vec::new() }
    }

    /// Build from pairs in any order. Keys are sorted; on duplicate keys the
    /// last occurrence wins.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, PropValue)>,
        K: Into<SmolStr>,
    {
        let mut props: Vec<(SmolStr, PropValue)> = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            match props.iter_mut().find(|(k, _)| *k == key) {
                Some((_, v)) => *v = value,
                None => props.push((key, value)),
            }
        }
        props.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        PropsForSearch { props }
    }

    /// Parse a bare `key=value,key=value` body (no surrounding brackets).
    pub fn parse(body: &str) -> Result<Self, StateParseError> {
        let mut parser = PropParser::new(body);
        let pairs = parser.parse_pairs()?;
        Ok(Self::from_pairs(pairs))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.props
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|i| &self.props[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &PropValue)> {
        self.props.iter().map(|(k, v)| (k, v))
    }

    /// Canonical rendering, keys ascending by byte comparison. The empty set
    /// renders as `{}` so it stays usable as a hash key.
    pub fn canonical(&self) -> String {
        if self.props.is_empty() {
            return "{}".to_string();
        }
        let mut out = String::from("[");
        for (i, (key, value)) in self.props.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(&value.to_string());
        }
        out.push(']');
        out
    }

    /// Compare this set (the anchor) against a query, producing per-key
    /// counts. Both sides are key-sorted so a single merge walk suffices.
    pub fn compare(&self, query: &PropsForSearch) -> MatchScore {
        let mut score = MatchScore::default();
        let (a, q) = (&self.props, &query.props);
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < q.len() {
            match a[i].0.as_str().cmp(q[j].0.as_str()) {
                std::cmp::Ordering::Equal => {
                    if a[i].1 == q[j].1 {
                        score.same += 1;
                    } else {
                        score.different += 1;
                    }
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    score.redundant += 1;
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    score.missing += 1;
                    j += 1;
                }
            }
        }
        score.redundant += (a.len() - i) as u32;
        score.missing += (q.len() - j) as u32;
        score
    }

    /// Decode from an NBT `States` compound. Bytes become booleans, ints stay
    /// ints, strings stay strings; other tag types are skipped.
    pub fn from_nbt(compound: &NbtCompound) -> Self {
        let mut pairs: Vec<(SmolStr, PropValue)> = Vec::with_capacity(compound.inner().len());
        for (key, tag) in compound.inner() {
            let value = match tag {
                NbtTag::Byte(b) => PropValue::Bool(*b != 0),
                NbtTag::Short(s) => PropValue::Int(*s as i32),
                NbtTag::Int(i) => PropValue::Int(*i),
                NbtTag::String(s) => PropValue::Str(s.into()),
                _ => continue,
            };
            pairs.push((key.into(), value));
        }
        Self::from_pairs(pairs)
    }

    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        for (key, value) in &self.props {
            match value {
                PropValue::Bool(b) => compound.insert(key.to_string(), NbtTag::Byte(*b as i8)),
                PropValue::Int(i) => compound.insert(key.to_string(), NbtTag::Int(*i)),
                PropValue::Str(s) => {
                    compound.insert(key.to_string(), NbtTag::String(s.to_string()))
                }
            }
        }
        compound
    }
}

/// A block identity: a (possibly namespaced) base name plus its properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockState {
    pub name: SmolStr,
    pub props: PropsForSearch,
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.props.is_empty() {
            write!(f, "{}", self.props.canonical())?;
        }
        Ok(())
    }
}

impl BlockState {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        BlockState {
            name: name.into(),
            props: PropsForSearch::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<SmolStr>, value: impl Into<PropValue>) -> Self {
        let mut pairs: Vec<(SmolStr, PropValue)> = self
            .props
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.push((key.into(), value.into()));
        self.props = PropsForSearch::from_pairs(pairs);
        self
    }

    pub fn with_props(mut self, props: PropsForSearch) -> Self {
        self.props = props;
        self
    }

    /// Name qualified with `minecraft:` when no namespace was given.
    pub fn full_name(&self) -> SmolStr {
        qualify(&self.name)
    }

    /// Name with a leading `minecraft:` stripped.
    pub fn base_name(&self) -> &str {
        base_form(&self.name)
    }

    /// Canonical string form, `name[k=v,...]`; the name renders verbatim and
    /// an empty property set adds no bracket suffix.
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Lenient parse of `base[k=v,...]`. The legacy curly-brace form
    /// `base{k=v,...}` is accepted, as is a missing closing bracket. When the
    /// property body is malformed the base name is still returned, with an
    /// empty property set and the error alongside.
    pub fn parse(input: &str) -> (BlockState, Option<StateParseError>) {
        let input = input.trim();
        let (name, body, body_offset) = match input.find(['[', '{']) {
            Some(i) => (&input[..i], &input[i + 1..], i + 1),
            None => (input, "", 0),
        };
        let body = body
            .strip_suffix(']')
            .or_else(|| body.strip_suffix('}'))
            .unwrap_or(body);
        match PropsForSearch::parse(body) {
            Ok(props) => (BlockState::new(name).with_props(props), None),
            Err(mut err) => {
                err.pos += body_offset;
                (BlockState::new(name), Some(err))
            }
        }
    }

    /// Like [`BlockState::parse`] but refusing malformed property bodies.
    pub fn parse_strict(input: &str) -> Result<BlockState, StateParseError> {
        match Self::parse(input) {
            (state, None) => Ok(state),
            (_, Some(err)) => Err(err),
        }
    }

    /// Encode as the `{Name, States}` palette-entry shape.
    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.insert("Name", self.full_name().to_string());
        compound.insert("States", NbtTag::Compound(self.props.to_nbt()));
        compound
    }

    pub fn from_nbt(compound: &NbtCompound) -> Result<Self, String> {
        let name: SmolStr = compound
            .get::<_, &String>("Name")
            .map_err(|e| format!("failed to get Name: {}", e))?
            .into();
        let props = match compound.get::<_, &NbtCompound>("States") {
            Ok(states) => PropsForSearch::from_nbt(states),
            Err(_) => PropsForSearch::new(),
        };
        Ok(BlockState { name, props })
    }
}

// ─── Property body parser ───────────────────────────────────────────────────

struct PropParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> PropParser<'a> {
    fn new(src: &'a str) -> Self {
        PropParser { src, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> StateParseError {
        StateParseError {
            pos: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn parse_pairs(&mut self) -> Result<Vec<(SmolStr, PropValue)>, StateParseError> {
        let mut pairs = Vec::new();
        self.skip_ws();
        while self.peek().is_some() {
            let key = self.parse_key()?;
            self.skip_ws();
            if self.peek() != Some(b'=') {
                return Err(self.error("expected '=' after property key"));
            }
            self.pos += 1;
            self.skip_ws();
            let value = self.parse_value()?;
            pairs.push((key, value));
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(b',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek().is_none() {
                        return Err(self.error("trailing comma in property list"));
                    }
                }
                Some(_) => return Err(self.error("expected ',' between properties")),
            }
        }
        Ok(pairs)
    }

    fn parse_key(&mut self) -> Result<SmolStr, StateParseError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'a'..=b'z') | Some(b'A'..=b'Z') | Some(b'0'..=b'9') | Some(b'_') | Some(b':')
        ) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected property key"));
        }
        Ok(SmolStr::new(&self.src[start..self.pos]))
    }

    fn parse_value(&mut self) -> Result<PropValue, StateParseError> {
        match self.peek() {
            Some(b'"') => self.parse_string(),
            Some(b'-') | Some(b'0'..=b'9') => self.parse_int(),
            Some(b't') | Some(b'f') => self.parse_bool(),
            _ => Err(self.error("expected a value: true/false, integer, or quoted string")),
        }
    }

    fn parse_string(&mut self) -> Result<PropValue, StateParseError> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string value")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(PropValue::Str(out.into()));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"') => out.push('"'),
                        Some(b'\\') => out.push('\\'),
                        _ => return Err(self.error("invalid escape in string value")),
                    }
                    self.pos += 1;
                }
                Some(_) => {
                    // Strings are UTF-8; advance one whole character.
                    let rest = &self.src[self.pos..];
                    let c = rest.chars().next().unwrap();
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn parse_int(&mut self) -> Result<PropValue, StateParseError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];
        match text.parse::<i32>() {
            Ok(i) => Ok(PropValue::Int(i)),
            Err(_) => {
                self.pos = start;
                Err(self.error(format!("invalid integer value '{}'", text)))
            }
        }
    }

    fn parse_bool(&mut self) -> Result<PropValue, StateParseError> {
        for (word, value) in [("true", true), ("false", false)] {
            if self.src[self.pos..].starts_with(word) {
                self.pos += word.len();
                return Ok(PropValue::Bool(value));
            }
        }
        Err(self.error("expected a value: true/false, integer, or quoted string"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_state_creation() {
        let block = BlockState::new("minecraft:stone").with_property("variant", "granite");

        assert_eq!(block.name, "minecraft:stone");
        assert_eq!(
            block.props.get("variant"),
            Some(&PropValue::Str("granite".into()))
        );
    }

    #[test]
    fn test_canonical_sorts_keys() {
        let (a, err) = BlockState::parse("stone_slab[type=\"top\",waterlogged=true]");
        assert!(err.is_none());
        let (b, err) = BlockState::parse("stone_slab{waterlogged=true,type=\"top\"}");
        assert!(err.is_none());

        assert_eq!(a, b);
        assert_eq!(a.canonical(), "stone_slab[type=\"top\",waterlogged=true]");
    }

    #[test]
    fn test_canonical_idempotent() {
        let inputs = [
            "minecraft:oak_log[axis=\"y\"]",
            "wool[color=\"red\",count=-3]",
            "air",
            "cake[bites=6]",
        ];
        for input in inputs {
            let first = BlockState::parse_strict(input).unwrap();
            let second = BlockState::parse_strict(&first.canonical()).unwrap();
            assert_eq!(first.canonical(), second.canonical());
        }
    }

    #[test]
    fn test_parse_value_types() {
        let props =
            PropsForSearch::parse("open=true,age=25,facing=\"north\",weird=\"a\\\"b\\\\c\"")
                .unwrap();
        assert_eq!(props.get("open"), Some(&PropValue::Bool(true)));
        assert_eq!(props.get("age"), Some(&PropValue::Int(25)));
        assert_eq!(props.get("facing"), Some(&PropValue::Str("north".into())));
        assert_eq!(props.get("weird"), Some(&PropValue::Str("a\"b\\c".into())));
    }

    #[test]
    fn test_parse_lenient_keeps_base_name() {
        let (state, err) = BlockState::parse("minecraft:rail[shape=@bad]");
        assert_eq!(state.name, "minecraft:rail");
        assert!(state.props.is_empty());
        let err = err.unwrap();
        assert!(err.pos > "minecraft:rail".len());
    }

    #[test]
    fn test_missing_closing_bracket() {
        let state = BlockState::parse_strict("oak_log[axis=\"x\"").unwrap();
        assert_eq!(state.props.get("axis"), Some(&PropValue::Str("x".into())));
    }

    #[test]
    fn test_empty_props_canonical_is_braces() {
        assert_eq!(PropsForSearch::new().canonical(), "{}");
        assert_eq!(BlockState::new("minecraft:air").canonical(), "minecraft:air");
    }

    #[test]
    fn test_type_mismatch_counts_as_different() {
        let anchor = PropsForSearch::from_pairs([("lit", PropValue::Bool(true))]);
        let query = PropsForSearch::from_pairs([("lit", PropValue::Int(1))]);
        let score = anchor.compare(&query);
        assert_eq!(score.same, 0);
        assert_eq!(score.different, 1);
        assert_eq!(score.redundant, 0);
        assert_eq!(score.missing, 0);
    }

    #[test]
    fn test_compare_counts() {
        let anchor = PropsForSearch::parse("a=1,b=2,c=3").unwrap();
        let query = PropsForSearch::parse("a=1,b=9,d=4").unwrap();
        let score = anchor.compare(&query);
        assert_eq!(score.same, 1); // a
        assert_eq!(score.different, 1); // b
        assert_eq!(score.redundant, 1); // c
        assert_eq!(score.missing, 1); // d
    }

    #[test]
    fn test_qualify_and_base_form() {
        assert_eq!(qualify("stone"), "minecraft:stone");
        assert_eq!(qualify("minecraft:stone"), "minecraft:stone");
        assert_eq!(qualify("mod:thing"), "mod:thing");
        assert_eq!(base_form("minecraft:stone"), "stone");
        assert_eq!(base_form("mod:thing"), "mod:thing");
    }
}
