//! Streaming parser for the ASN.1 text notation.
//!
//! Hand-rolled recursive descent over a seekable byte stream. Every token
//! carries its byte offset, which is what makes the big-file protocol work:
//! a skip-eligible `set` member is bracket-matched past without building
//! objects, and only its start offset is recorded. The extend pass later
//! seeks back to that offset and decodes the member for real.
//!
//! Unknown field names are skipped structurally rather than rejected, so the
//! engine tolerates inputs richer than the model subset it understands.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::DiscError;
use crate::Result;

use super::{
    BioSource, Bioseq, BioseqSet, ContactInfo, FeatKind, Genome, MolInfo, MolType, OrgMod, OrgRef,
    Pubdesc, SeqAnnot, SeqDesc, SeqEntry, SeqFeat, SeqInst, SeqLoc, SeqSubmit, SetClass,
    SetMember, Strand, SubSource, SubmitBlock, TopLevel, TopLevelKind,
};

/// Combined source trait for the streaming reader.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Open an input file, sniffing gzip by magic bytes.
///
/// Gzipped inputs are decompressed eagerly into memory so the stream stays
/// seekable; the returned flag tells the caller the input was compressed
/// (autofix output naming depends on it).
pub fn open_input(path: &Path) -> Result<(Box<dyn ReadSeek>, bool)> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    file.seek(SeekFrom::Start(0))?;
    if n == 2 && magic == [0x1f, 0x8b] {
        let mut data = Vec::new();
        MultiGzDecoder::new(file).read_to_end(&mut data)?;
        Ok((Box::new(Cursor::new(data)), true))
    } else {
        Ok((Box::new(BufReader::new(file)), false))
    }
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    Comma,
    /// `::=`
    Define,
    Ident(String),
    Str(String),
    Int(i64),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Define => "'::='".to_string(),
            Token::Ident(s) => format!("identifier '{}'", s),
            Token::Str(_) => "string".to_string(),
            Token::Int(n) => format!("integer {}", n),
        }
    }
}

/// Streaming reader over one input file.
pub struct AsnReader<R: ReadSeek> {
    inner: R,
    /// Byte offset of the next unread byte.
    pos: u64,
    byte_peek: Option<u8>,
    token_peek: Option<(u64, Token)>,
    /// Big-file mode: skip-eligible set members are deferred.
    pub big_file: bool,
    source_name: String,
}

impl<R: ReadSeek> AsnReader<R> {
    pub fn new(inner: R, source_name: impl Into<String>) -> Self {
        Self {
            inner,
            pos: 0,
            byte_peek: None,
            token_peek: None,
            big_file: false,
            source_name: source_name.into(),
        }
    }

    pub fn with_big_file(mut self, big_file: bool) -> Self {
        self.big_file = big_file;
        self
    }

    /// Name of the underlying source, for error messages.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Byte offset of the next unread input byte.
    ///
    /// With a peeked token pending this reports the position after that
    /// token's last byte, which is exactly the end of the last consumed value
    /// when called between records.
    pub fn position(&self) -> u64 {
        match &self.byte_peek {
            Some(_) => self.pos - 1,
            None => self.pos,
        }
    }

    /// Seek to an absolute byte offset, discarding any lookahead.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(|e| DiscError::Seek {
                pos: offset,
                msg: e.to_string(),
            })?;
        self.pos = offset;
        self.byte_peek = None;
        self.token_peek = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lexer
    // ------------------------------------------------------------------

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.byte_peek.take() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.inner.read(&mut buf)? {
            0 => Ok(None),
            _ => {
                self.pos += 1;
                Ok(Some(buf[0]))
            }
        }
    }

    fn unread_byte(&mut self, b: u8) {
        debug_assert!(self.byte_peek.is_none());
        self.byte_peek = Some(b);
    }

    fn lex(&mut self) -> Result<Option<(u64, Token)>> {
        // skip whitespace
        let b = loop {
            match self.read_byte()? {
                None => return Ok(None),
                Some(b) if (b as char).is_ascii_whitespace() => continue,
                Some(b) => break b,
            }
        };
        let start = self.pos - 1;
        let token = match b {
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b',' => Token::Comma,
            b':' => {
                let b2 = self.read_byte()?;
                let b3 = self.read_byte()?;
                if b2 != Some(b':') || b3 != Some(b'=') {
                    return Err(DiscError::parse(start, "expected '::='"));
                }
                Token::Define
            }
            b'"' => {
                let mut s = String::new();
                loop {
                    match self.read_byte()? {
                        None => {
                            return Err(DiscError::parse(start, "unterminated string"));
                        }
                        Some(b'"') => {
                            // doubled quote is an escaped quote
                            match self.read_byte()? {
                                Some(b'"') => s.push('"'),
                                Some(other) => {
                                    self.unread_byte(other);
                                    break;
                                }
                                None => break,
                            }
                        }
                        Some(other) => s.push(other as char),
                    }
                }
                Token::Str(s)
            }
            b'-' | b'0'..=b'9' => {
                let mut s = String::new();
                s.push(b as char);
                loop {
                    match self.read_byte()? {
                        Some(d @ b'0'..=b'9') => s.push(d as char),
                        Some(other) => {
                            self.unread_byte(other);
                            break;
                        }
                        None => break,
                    }
                }
                let n: i64 = s
                    .parse()
                    .map_err(|_| DiscError::parse(start, format!("invalid integer '{}'", s)))?;
                Token::Int(n)
            }
            b if (b as char).is_ascii_alphabetic() => {
                let mut s = String::new();
                s.push(b as char);
                loop {
                    match self.read_byte()? {
                        Some(c)
                            if (c as char).is_ascii_alphanumeric()
                                || c == b'-'
                                || c == b'_'
                                || c == b'.' =>
                        {
                            s.push(c as char)
                        }
                        Some(other) => {
                            self.unread_byte(other);
                            break;
                        }
                        None => break,
                    }
                }
                Token::Ident(s)
            }
            other => {
                return Err(DiscError::parse(
                    start,
                    format!("unexpected character '{}'", other as char),
                ));
            }
        };
        Ok(Some((start, token)))
    }

    fn peek(&mut self) -> Result<Option<&(u64, Token)>> {
        if self.token_peek.is_none() {
            self.token_peek = self.lex()?;
        }
        Ok(self.token_peek.as_ref())
    }

    fn next(&mut self) -> Result<Option<(u64, Token)>> {
        if let Some(t) = self.token_peek.take() {
            return Ok(Some(t));
        }
        self.lex()
    }

    fn next_required(&mut self) -> Result<(u64, Token)> {
        self.next()?
            .ok_or_else(|| DiscError::parse(self.pos, "unexpected end of input"))
    }

    fn expect_lbrace(&mut self) -> Result<()> {
        match self.next_required()? {
            (_, Token::LBrace) => Ok(()),
            (pos, tok) => Err(DiscError::parse(
                pos,
                format!("expected '{{', found {}", tok.describe()),
            )),
        }
    }

    fn expect_rbrace(&mut self) -> Result<()> {
        match self.next_required()? {
            (_, Token::RBrace) => Ok(()),
            (pos, tok) => Err(DiscError::parse(
                pos,
                format!("expected '}}', found {}", tok.describe()),
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.next_required()? {
            (_, Token::Ident(s)) => Ok(s),
            (pos, tok) => Err(DiscError::parse(
                pos,
                format!("expected identifier, found {}", tok.describe()),
            )),
        }
    }

    fn expect_str(&mut self) -> Result<String> {
        match self.next_required()? {
            (_, Token::Str(s)) => Ok(s),
            // bare idents are tolerated where strings are expected
            (_, Token::Ident(s)) => Ok(s),
            (pos, tok) => Err(DiscError::parse(
                pos,
                format!("expected string, found {}", tok.describe()),
            )),
        }
    }

    fn expect_usize(&mut self) -> Result<usize> {
        match self.next_required()? {
            (pos, Token::Int(n)) => usize::try_from(n)
                .map_err(|_| DiscError::parse(pos, format!("negative count {}", n))),
            (pos, tok) => Err(DiscError::parse(
                pos,
                format!("expected integer, found {}", tok.describe()),
            )),
        }
    }

    fn eat_comma(&mut self) -> Result<bool> {
        if matches!(self.peek()?, Some((_, Token::Comma))) {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn eat_rbrace(&mut self) -> Result<bool> {
        if matches!(self.peek()?, Some((_, Token::RBrace))) {
            self.next()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn peek_is_lbrace(&mut self) -> Result<bool> {
        Ok(matches!(self.peek()?, Some((_, Token::LBrace))))
    }

    // ------------------------------------------------------------------
    // Structural skipping
    // ------------------------------------------------------------------

    /// Skip one value without building objects: a braced block, a bare
    /// token, or an identifier followed by a braced block (variant form).
    pub fn skip_value(&mut self) -> Result<()> {
        match self.next_required()? {
            (_, Token::LBrace) => self.skip_to_close(1),
            (_, Token::Ident(_)) => {
                if self.peek_is_lbrace()? {
                    self.next()?;
                    self.skip_to_close(1)?;
                }
                Ok(())
            }
            (_, Token::Str(_)) | (_, Token::Int(_)) => Ok(()),
            (pos, tok) => Err(DiscError::parse(
                pos,
                format!("cannot skip {}", tok.describe()),
            )),
        }
    }

    /// Consume tokens until `depth` open braces have been closed.
    fn skip_to_close(&mut self, mut depth: usize) -> Result<()> {
        while depth > 0 {
            match self.next_required()? {
                (_, Token::LBrace) => depth += 1,
                (_, Token::RBrace) => depth -= 1,
                _ => {}
            }
        }
        Ok(())
    }

    /// Copy the raw byte range `[from, to)` to `out`, restoring the read
    /// position afterwards. The autofix replay uses this as its default
    /// copy: records without a pending fix pass through untouched.
    pub fn copy_raw<W: std::io::Write>(
        &mut self,
        out: &mut W,
        from: u64,
        to: u64,
    ) -> Result<()> {
        let resume = self.position();
        self.seek(from)?;
        let mut remaining = to.saturating_sub(from);
        let mut buf = [0u8; 8192];
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let got = self.inner.read(&mut buf[..want])?;
            if got == 0 {
                break;
            }
            out.write_all(&buf[..got])?;
            remaining -= got as u64;
        }
        self.seek(resume)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Top-level records
    // ------------------------------------------------------------------

    /// Read the next top-level header, or `None` at end of stream.
    ///
    /// Returns the kind and the byte offset of the header identifier.
    /// An unrecognized header is fatal for the whole run.
    pub fn next_top_level(&mut self) -> Result<Option<(TopLevelKind, u64)>> {
        let (pos, tok) = match self.next()? {
            None => return Ok(None),
            Some(t) => t,
        };
        let name = match tok {
            Token::Ident(name) => name,
            other => {
                return Err(DiscError::parse(
                    pos,
                    format!("expected top-level header, found {}", other.describe()),
                ));
            }
        };
        let kind = match name.as_str() {
            "Seq-submit" => TopLevelKind::Submit,
            "Seq-entry" => TopLevelKind::Entry,
            "Bioseq-set" => TopLevelKind::Set,
            "Bioseq" => TopLevelKind::Seq,
            _ => return Err(DiscError::unsupported(name, self.source_name.clone())),
        };
        match self.next_required()? {
            (_, Token::Define) => Ok(Some((kind, pos))),
            (pos, tok) => Err(DiscError::parse(
                pos,
                format!("expected '::=', found {}", tok.describe()),
            )),
        }
    }

    /// Decode the record following a [`next_top_level`] header.
    pub fn read_top_level(&mut self, kind: TopLevelKind) -> Result<TopLevel> {
        match kind {
            TopLevelKind::Submit => Ok(TopLevel::Submit(self.parse_submit()?)),
            TopLevelKind::Entry => Ok(TopLevel::Entry(self.parse_entry()?)),
            TopLevelKind::Set => {
                self.expect_lbrace()?;
                Ok(TopLevel::Entry(SeqEntry::Set(self.parse_set_body(None)?)))
            }
            TopLevelKind::Seq => {
                self.expect_lbrace()?;
                Ok(TopLevel::Entry(SeqEntry::Seq(self.parse_bioseq_body()?)))
            }
        }
    }

    /// Skip the record following a [`next_top_level`] header.
    pub fn skip_top_level(&mut self, _kind: TopLevelKind) -> Result<()> {
        self.skip_value()
    }

    /// Whether the upcoming `Seq-entry` body is a `set`, without consuming
    /// anything. Used by the replay pass to assign record node kinds before
    /// deciding between raw copy and full decode.
    pub fn peek_entry_is_set(&mut self) -> Result<bool> {
        Ok(matches!(self.peek()?, Some((_, Token::Ident(name))) if name == "set"))
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    /// Parse a `seq { ... }` or `set { ... }` entry.
    pub fn parse_entry(&mut self) -> Result<SeqEntry> {
        let (pos, tok) = self.next_required()?;
        match tok {
            Token::Ident(name) if name == "seq" => {
                self.expect_lbrace()?;
                Ok(SeqEntry::Seq(self.parse_bioseq_body()?))
            }
            Token::Ident(name) if name == "set" => {
                self.expect_lbrace()?;
                Ok(SeqEntry::Set(self.parse_set_body(None)?))
            }
            other => Err(DiscError::parse(
                pos,
                format!("expected 'seq' or 'set', found {}", other.describe()),
            )),
        }
    }

    /// Parse set fields after the opening brace. `preclass` carries a class
    /// already consumed by the deferral probe.
    fn parse_set_body(&mut self, preclass: Option<SetClass>) -> Result<BioseqSet> {
        let mut set = BioseqSet {
            class: preclass.unwrap_or(SetClass::Other),
            descr: Vec::new(),
            annot: Vec::new(),
            seq_set: Vec::new(),
        };
        // when a class was pre-consumed the next token is ',' or '}'
        if preclass.is_some() {
            if self.eat_rbrace()? {
                return Ok(set);
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                return Ok(set);
            }
        } else if self.eat_rbrace()? {
            return Ok(set);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "class" => set.class = SetClass::from_token(&self.expect_ident()?),
                "descr" => set.descr = self.parse_descr()?,
                "annot" => set.annot = self.parse_annots()?,
                "seq-set" => {
                    // nothing inside a biological unit may be skipped: the
                    // cross-feature resolution scope must see it whole
                    let saved = self.big_file;
                    if set.class.is_biological_unit() {
                        self.big_file = false;
                    }
                    let members = self.parse_set_members();
                    self.big_file = saved;
                    set.seq_set = members?;
                }
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(set)
    }

    /// Parse a `seq-set { ... }` member list, deferring skip-eligible sets.
    ///
    /// A member is skip-eligible when big-file mode is on, it is not the
    /// first member, and its class is not a biological unit. Only `set`
    /// members are ever skipped; a bare `seq` is always decoded.
    fn parse_set_members(&mut self) -> Result<Vec<SetMember>> {
        self.expect_lbrace()?;
        let mut members = Vec::new();
        if self.eat_rbrace()? {
            return Ok(members);
        }
        loop {
            let (pos, tok) = self.next_required()?;
            let member = match tok {
                Token::Ident(name) if name == "seq" => {
                    self.expect_lbrace()?;
                    SetMember::Entry(SeqEntry::Seq(self.parse_bioseq_body()?))
                }
                Token::Ident(name) if name == "set" => {
                    self.expect_lbrace()?;
                    self.parse_set_member_body(pos, !members.is_empty())?
                }
                other => {
                    return Err(DiscError::parse(
                        pos,
                        format!("expected 'seq' or 'set', found {}", other.describe()),
                    ));
                }
            };
            members.push(member);
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(members)
    }

    /// Decode or defer one `set { ... }` member whose opening brace has been
    /// consumed. `offset` is the byte offset of the `set` keyword, which is
    /// where a later seek must land to re-parse the member.
    fn parse_set_member_body(&mut self, offset: u64, skippable: bool) -> Result<SetMember> {
        if self.big_file && skippable {
            // probe the leading class field to decide eligibility
            if matches!(self.peek()?, Some((_, Token::Ident(name))) if name == "class") {
                self.next()?;
                let class = SetClass::from_token(&self.expect_ident()?);
                if !class.is_biological_unit() {
                    tracing::debug!(offset, class = class.as_token(), "deferring set member");
                    self.skip_to_close(1)?;
                    return Ok(SetMember::Deferred { offset, class });
                }
                return Ok(SetMember::Entry(SeqEntry::Set(
                    self.parse_set_body(Some(class))?,
                )));
            }
        }
        Ok(SetMember::Entry(SeqEntry::Set(self.parse_set_body(None)?)))
    }

    /// Re-decode a previously deferred member at its recorded offset.
    pub fn read_deferred(&mut self, offset: u64) -> Result<SeqEntry> {
        self.seek(offset)?;
        // never defer again while extending
        let saved = self.big_file;
        self.big_file = false;
        let entry = self.parse_entry();
        self.big_file = saved;
        entry
    }

    // ------------------------------------------------------------------
    // Bioseq
    // ------------------------------------------------------------------

    fn parse_bioseq_body(&mut self) -> Result<Bioseq> {
        let mut seq = Bioseq {
            id: String::new(),
            inst: SeqInst {
                mol: MolType::Dna,
                length: 0,
                data: None,
            },
            descr: Vec::new(),
            annot: Vec::new(),
        };
        if self.eat_rbrace()? {
            return Ok(seq);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "id" => seq.id = self.expect_str()?,
                "inst" => seq.inst = self.parse_inst()?,
                "descr" => seq.descr = self.parse_descr()?,
                "annot" => seq.annot = self.parse_annots()?,
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(seq)
    }

    fn parse_inst(&mut self) -> Result<SeqInst> {
        self.expect_lbrace()?;
        let mut inst = SeqInst {
            mol: MolType::Dna,
            length: 0,
            data: None,
        };
        if self.eat_rbrace()? {
            return Ok(inst);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "mol" => {
                    let (pos, tok) = self.next_required()?;
                    inst.mol = match tok {
                        Token::Ident(m) if m == "dna" => MolType::Dna,
                        Token::Ident(m) if m == "rna" => MolType::Rna,
                        Token::Ident(m) if m == "aa" => MolType::Aa,
                        other => {
                            return Err(DiscError::parse(
                                pos,
                                format!("unknown molecule type {}", other.describe()),
                            ));
                        }
                    };
                }
                "length" => inst.length = self.expect_usize()?,
                "seq-data" => inst.data = Some(self.expect_str()?),
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(inst)
    }

    // ------------------------------------------------------------------
    // Descriptors
    // ------------------------------------------------------------------

    fn parse_descr(&mut self) -> Result<Vec<SeqDesc>> {
        self.expect_lbrace()?;
        let mut descr = Vec::new();
        if self.eat_rbrace()? {
            return Ok(descr);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "title" => descr.push(SeqDesc::Title(self.expect_str()?)),
                "comment" => descr.push(SeqDesc::Comment(self.expect_str()?)),
                "user" => descr.push(SeqDesc::User(self.expect_str()?)),
                "molinfo" => descr.push(SeqDesc::MolInfo(self.parse_molinfo()?)),
                "source" => descr.push(SeqDesc::Source(self.parse_biosource()?)),
                "pub" => descr.push(SeqDesc::Pub(self.parse_pubdesc()?)),
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(descr)
    }

    fn parse_molinfo(&mut self) -> Result<MolInfo> {
        self.expect_lbrace()?;
        let mut info = MolInfo {
            biomol: String::new(),
            completeness: None,
        };
        if self.eat_rbrace()? {
            return Ok(info);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "biomol" => info.biomol = self.expect_str()?,
                "completeness" => info.completeness = Some(self.expect_str()?),
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(info)
    }

    fn parse_biosource(&mut self) -> Result<BioSource> {
        self.expect_lbrace()?;
        let mut src = BioSource::default();
        if self.eat_rbrace()? {
            return Ok(src);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "genome" => src.genome = Genome::from_token(&self.expect_ident()?),
                "org" => src.org = self.parse_org()?,
                "subtype" => src.subtype = self.parse_subsources()?,
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(src)
    }

    fn parse_org(&mut self) -> Result<OrgRef> {
        self.expect_lbrace()?;
        let mut org = OrgRef::default();
        if self.eat_rbrace()? {
            return Ok(org);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "taxname" => org.taxname = self.expect_str()?,
                "lineage" => org.lineage = Some(self.expect_str()?),
                "orgmod" => org.orgmod = self.parse_orgmods()?,
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(org)
    }

    fn parse_orgmods(&mut self) -> Result<Vec<OrgMod>> {
        self.parse_struct_list(|r| {
            let mut subtype = String::new();
            let mut subname = String::new();
            r.parse_fields(|r, name| {
                match name {
                    "subtype" => subtype = r.expect_str()?,
                    "subname" => subname = r.expect_str()?,
                    _ => r.skip_value()?,
                }
                Ok(())
            })?;
            Ok(OrgMod { subtype, subname })
        })
    }

    fn parse_subsources(&mut self) -> Result<Vec<SubSource>> {
        self.parse_struct_list(|r| {
            let mut subtype = String::new();
            let mut name_val = String::new();
            r.parse_fields(|r, name| {
                match name {
                    "subtype" => subtype = r.expect_str()?,
                    "name" => name_val = r.expect_str()?,
                    _ => r.skip_value()?,
                }
                Ok(())
            })?;
            Ok(SubSource {
                subtype,
                name: name_val,
            })
        })
    }

    fn parse_pubdesc(&mut self) -> Result<Pubdesc> {
        self.expect_lbrace()?;
        let mut pubdesc = Pubdesc {
            title: String::new(),
            authors: Vec::new(),
        };
        if self.eat_rbrace()? {
            return Ok(pubdesc);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "title" => pubdesc.title = self.expect_str()?,
                "authors" => pubdesc.authors = self.parse_string_list()?,
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(pubdesc)
    }

    // ------------------------------------------------------------------
    // Annotations and features
    // ------------------------------------------------------------------

    /// `annot { ftable { ... } }` or `annot { { ftable { ... } }, ... }`.
    fn parse_annots(&mut self) -> Result<Vec<SeqAnnot>> {
        self.expect_lbrace()?;
        if self.eat_rbrace()? {
            return Ok(Vec::new());
        }
        // single-annot shorthand
        if matches!(self.peek()?, Some((_, Token::Ident(_)))) {
            let annot = self.parse_annot_fields()?;
            self.expect_rbrace()?;
            return Ok(vec![annot]);
        }
        let mut annots = Vec::new();
        loop {
            self.expect_lbrace()?;
            let annot = if self.eat_rbrace()? {
                SeqAnnot { ftable: Vec::new() }
            } else {
                let a = self.parse_annot_fields()?;
                self.expect_rbrace()?;
                a
            };
            annots.push(annot);
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(annots)
    }

    fn parse_annot_fields(&mut self) -> Result<SeqAnnot> {
        let mut annot = SeqAnnot { ftable: Vec::new() };
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "ftable" => annot.ftable = self.parse_ftable()?,
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                break;
            }
        }
        Ok(annot)
    }

    fn parse_ftable(&mut self) -> Result<Vec<SeqFeat>> {
        self.parse_struct_list(|r| r.parse_feat_fields())
    }

    fn parse_feat_fields(&mut self) -> Result<SeqFeat> {
        let mut feat = SeqFeat {
            kind: FeatKind::Other,
            location: SeqLoc {
                id: String::new(),
                from: 0,
                to: 0,
                strand: Strand::Unknown,
            },
            product: None,
            comment: None,
            quals: Vec::new(),
        };
        self.parse_fields(|r, name| {
            match name {
                "data" => feat.kind = FeatKind::from_token(&r.expect_ident()?),
                "location" => feat.location = r.parse_loc()?,
                "product" => feat.product = Some(r.expect_str()?),
                "comment" => feat.comment = Some(r.expect_str()?),
                "qual" => feat.quals = r.parse_quals()?,
                _ => r.skip_value()?,
            }
            Ok(())
        })?;
        Ok(feat)
    }

    fn parse_loc(&mut self) -> Result<SeqLoc> {
        self.expect_lbrace()?;
        let mut loc = SeqLoc {
            id: String::new(),
            from: 0,
            to: 0,
            strand: Strand::Unknown,
        };
        if self.eat_rbrace()? {
            return Ok(loc);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "id" => loc.id = self.expect_str()?,
                "from" => loc.from = self.expect_usize()?,
                "to" => loc.to = self.expect_usize()?,
                "strand" => {
                    loc.strand = match self.expect_ident()?.as_str() {
                        "plus" => Strand::Plus,
                        "minus" => Strand::Minus,
                        _ => Strand::Unknown,
                    }
                }
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(loc)
    }

    fn parse_quals(&mut self) -> Result<Vec<(String, String)>> {
        self.parse_struct_list(|r| {
            let mut key = String::new();
            let mut val = String::new();
            r.parse_fields(|r, name| {
                match name {
                    "qual" => key = r.expect_str()?,
                    "val" => val = r.expect_str()?,
                    _ => r.skip_value()?,
                }
                Ok(())
            })?;
            Ok((key, val))
        })
    }

    // ------------------------------------------------------------------
    // Submit
    // ------------------------------------------------------------------

    fn parse_submit(&mut self) -> Result<SeqSubmit> {
        self.expect_lbrace()?;
        let mut submit = SeqSubmit {
            block: SubmitBlock::default(),
            entries: Vec::new(),
        };
        if self.eat_rbrace()? {
            return Ok(submit);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "sub" => submit.block = self.parse_submit_block()?,
                "data" => submit.entries = self.parse_entry_list()?,
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(submit)
    }

    fn parse_submit_block(&mut self) -> Result<SubmitBlock> {
        self.expect_lbrace()?;
        let mut block = SubmitBlock::default();
        if self.eat_rbrace()? {
            return Ok(block);
        }
        loop {
            let name = self.expect_ident()?;
            match name.as_str() {
                "contact" => {
                    let mut contact = ContactInfo::default();
                    self.expect_lbrace()?;
                    if !self.eat_rbrace()? {
                        loop {
                            let field = self.expect_ident()?;
                            match field.as_str() {
                                "name" => contact.name = self.expect_str()?,
                                "email" => contact.email = Some(self.expect_str()?),
                                _ => self.skip_value()?,
                            }
                            if !self.eat_comma()? {
                                self.expect_rbrace()?;
                                break;
                            }
                        }
                    }
                    block.contact = Some(contact);
                }
                "authors" => block.authors = self.parse_string_list()?,
                "tool" => block.tool = Some(self.expect_str()?),
                _ => self.skip_value()?,
            }
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(block)
    }

    fn parse_entry_list(&mut self) -> Result<Vec<SeqEntry>> {
        self.expect_lbrace()?;
        let mut entries = Vec::new();
        if self.eat_rbrace()? {
            return Ok(entries);
        }
        loop {
            entries.push(self.parse_entry()?);
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // Small shared shapes
    // ------------------------------------------------------------------

    /// `{ "a", "b", ... }`
    fn parse_string_list(&mut self) -> Result<Vec<String>> {
        self.expect_lbrace()?;
        let mut items = Vec::new();
        if self.eat_rbrace()? {
            return Ok(items);
        }
        loop {
            items.push(self.expect_str()?);
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(items)
    }

    /// `{ { ... }, { ... } }` where each inner block is parsed by `f` after
    /// its opening brace has been consumed.
    fn parse_struct_list<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        self.expect_lbrace()?;
        let mut items = Vec::new();
        if self.eat_rbrace()? {
            return Ok(items);
        }
        loop {
            self.expect_lbrace()?;
            items.push(f(self)?);
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(items)
    }

    /// Field loop for a block whose opening brace has been consumed; `f`
    /// handles one named field. The closing brace is consumed here.
    fn parse_fields(
        &mut self,
        mut f: impl FnMut(&mut Self, &str) -> Result<()>,
    ) -> Result<()> {
        if self.eat_rbrace()? {
            return Ok(());
        }
        loop {
            let name = self.expect_ident()?;
            f(self, &name)?;
            if !self.eat_comma()? {
                self.expect_rbrace()?;
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> AsnReader<Cursor<Vec<u8>>> {
        AsnReader::new(Cursor::new(text.as_bytes().to_vec()), "test")
    }

    const SIMPLE_SEQ: &str = r#"Seq-entry ::= seq {
  id "seq1",
  inst { mol dna, length 8, seq-data "ACGTACGT" },
  descr { title "test sequence" }
}"#;

    #[test]
    fn test_parse_simple_bioseq() {
        let mut r = reader(SIMPLE_SEQ);
        let (kind, _) = r.next_top_level().unwrap().unwrap();
        assert_eq!(kind, TopLevelKind::Entry);
        let top = r.read_top_level(kind).unwrap();
        let TopLevel::Entry(SeqEntry::Seq(seq)) = top else {
            panic!("expected a Bioseq");
        };
        assert_eq!(seq.id, "seq1");
        assert_eq!(seq.inst.length, 8);
        assert_eq!(seq.inst.data.as_deref(), Some("ACGTACGT"));
        assert_eq!(seq.descr.len(), 1);
        assert!(r.next_top_level().unwrap().is_none());
    }

    #[test]
    fn test_parse_nuc_prot_set_with_features() {
        let text = r#"Seq-entry ::= set {
  class nuc-prot,
  descr {
    source {
      genome genomic,
      org { taxname "Homo sapiens", lineage "Eukaryota; Metazoa" },
      subtype { { subtype map, name "m1" } }
    }
  },
  seq-set {
    seq {
      id "nuc1",
      inst { mol dna, length 20, seq-data "ACGTACGTACGTACGTACGT" },
      annot {
        ftable {
          { data trna, location { id "nuc1", from 0, to 10, strand plus } },
          { data cdregion, location { id "nuc1", from 5, to 15, strand plus } }
        }
      }
    },
    seq {
      id "prot1",
      inst { mol aa, length 5, seq-data "MKLVR" }
    }
  }
}"#;
        let mut r = reader(text);
        let (kind, _) = r.next_top_level().unwrap().unwrap();
        let TopLevel::Entry(SeqEntry::Set(set)) = r.read_top_level(kind).unwrap() else {
            panic!("expected a set");
        };
        assert_eq!(set.class, SetClass::NucProt);
        assert_eq!(set.seq_set.len(), 2);
        let SetMember::Entry(SeqEntry::Seq(nuc)) = &set.seq_set[0] else {
            panic!("expected decoded member");
        };
        assert_eq!(nuc.features().count(), 2);
        let feats: Vec<_> = nuc.features().collect();
        assert_eq!(feats[0].kind, FeatKind::Trna);
        assert!(feats[0].location.overlaps(&feats[1].location));
        let src = set.descr[0].as_source().unwrap();
        assert_eq!(src.org.taxname, "Homo sapiens");
        assert_eq!(src.subsource("map"), Some("m1"));
    }

    const TWO_SIBLINGS: &str = r#"Bioseq-set ::= {
  class genbank,
  seq-set {
    set {
      class pop-set,
      seq-set { seq { id "a1", inst { mol dna, length 4, seq-data "ACGT" } } }
    },
    set {
      class pop-set,
      seq-set { seq { id "b1", inst { mol dna, length 4, seq-data "TTTT" } } }
    }
  }
}"#;

    #[test]
    fn test_big_file_defers_second_sibling_only() {
        let mut r = reader(TWO_SIBLINGS).with_big_file(true);
        let (kind, _) = r.next_top_level().unwrap().unwrap();
        let TopLevel::Entry(SeqEntry::Set(set)) = r.read_top_level(kind).unwrap() else {
            panic!("expected a set");
        };
        assert!(matches!(set.seq_set[0], SetMember::Entry(_)));
        let SetMember::Deferred { offset, class } = set.seq_set[1] else {
            panic!("second sibling should be deferred");
        };
        assert_eq!(class, SetClass::PopSet);

        // seeking back must reproduce the same subtree a full decode gives
        let entry = r.read_deferred(offset).unwrap();
        let SeqEntry::Set(inner) = entry else {
            panic!("expected a set");
        };
        let SetMember::Entry(SeqEntry::Seq(seq)) = &inner.seq_set[0] else {
            panic!("expected decoded member");
        };
        assert_eq!(seq.id, "b1");
    }

    #[test]
    fn test_big_file_never_defers_nuc_prot() {
        let text = r#"Bioseq-set ::= {
  seq-set {
    seq { id "x", inst { mol dna, length 4, seq-data "ACGT" } },
    set {
      class nuc-prot,
      seq-set { seq { id "n1", inst { mol dna, length 4, seq-data "ACGT" } } }
    }
  }
}"#;
        let mut r = reader(text).with_big_file(true);
        let (kind, _) = r.next_top_level().unwrap().unwrap();
        let TopLevel::Entry(SeqEntry::Set(set)) = r.read_top_level(kind).unwrap() else {
            panic!("expected a set");
        };
        assert!(matches!(set.seq_set[1], SetMember::Entry(SeqEntry::Set(_))));
    }

    #[test]
    fn test_unsupported_top_level_is_fatal() {
        let mut r = reader("Seq-align ::= { }");
        let err = r.next_top_level().unwrap_err();
        assert!(matches!(err, DiscError::UnsupportedType { .. }));
        assert!(err.to_string().contains("Seq-align"));
        assert!(err.to_string().contains("test"));
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let text = r#"Seq-entry ::= seq {
  id "seq1",
  future-field { nested { deep "value" }, other 12 },
  inst { mol rna, length 4, seq-data "ACGU" }
}"#;
        let mut r = reader(text);
        let (kind, _) = r.next_top_level().unwrap().unwrap();
        let TopLevel::Entry(SeqEntry::Seq(seq)) = r.read_top_level(kind).unwrap() else {
            panic!("expected a Bioseq");
        };
        assert_eq!(seq.id, "seq1");
        assert_eq!(seq.inst.mol, MolType::Rna);
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let mut r = reader(r#"Seq-entry ::= seq { id "a""b" }"#);
        let (kind, _) = r.next_top_level().unwrap().unwrap();
        let TopLevel::Entry(SeqEntry::Seq(seq)) = r.read_top_level(kind).unwrap() else {
            panic!("expected a Bioseq");
        };
        assert_eq!(seq.id, "a\"b");
    }

    #[test]
    fn test_multiple_top_level_records() {
        let text = format!("{}\n\n{}\n", SIMPLE_SEQ, SIMPLE_SEQ);
        let mut r = reader(&text);
        let mut count = 0;
        while let Some((kind, _)) = r.next_top_level().unwrap() {
            r.read_top_level(kind).unwrap();
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[test]
    fn test_submit_block_round_trip() {
        let text = r#"Seq-submit ::= {
  sub {
    contact { name "Jane Doe", email "jane@lab.example" },
    authors { "Doe J", "Smith A" },
    tool "tbl2asn"
  },
  data {
    seq { id "s1", inst { mol dna, length 4, seq-data "ACGT" } }
  }
}"#;
        let mut r = reader(text);
        let (kind, _) = r.next_top_level().unwrap().unwrap();
        assert_eq!(kind, TopLevelKind::Submit);
        let TopLevel::Submit(submit) = r.read_top_level(kind).unwrap() else {
            panic!("expected a submit");
        };
        let contact = submit.block.contact.unwrap();
        assert_eq!(contact.name, "Jane Doe");
        assert_eq!(contact.email.as_deref(), Some("jane@lab.example"));
        assert_eq!(submit.block.authors.len(), 2);
        assert_eq!(submit.entries.len(), 1);
    }

    #[test]
    fn test_record_span_positions() {
        let text = format!("{}\n{}\n", SIMPLE_SEQ, SIMPLE_SEQ);
        let mut r = reader(&text);
        let (kind, start) = r.next_top_level().unwrap().unwrap();
        assert_eq!(start, 0);
        r.skip_top_level(kind).unwrap();
        let end = r.position();
        assert_eq!(&text[start as usize..end as usize], SIMPLE_SEQ);

        // second record re-parses identically after a seek back
        let (kind2, start2) = r.next_top_level().unwrap().unwrap();
        r.seek(start2).unwrap();
        let (kind3, start3) = r.next_top_level().unwrap().unwrap();
        assert_eq!(kind2, kind3);
        assert_eq!(start2, start3);
        r.read_top_level(kind3).unwrap();
    }
}
