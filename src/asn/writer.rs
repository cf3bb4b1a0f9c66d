//! Serializer for the ASN.1 text notation.
//!
//! Used by the autofix replay pass to re-emit records that contained a fixed
//! subtree; everything the parser reads, this writes back in the same
//! notation. Deferred set members cannot be written — the replay pass always
//! decodes records fully before rewriting them.

use std::io::{self, Write};

use super::{
    BioSource, Bioseq, BioseqSet, MolInfo, Pubdesc, SeqAnnot, SeqDesc, SeqEntry, SeqFeat,
    SeqInst, SeqLoc, SeqSubmit, SetMember, Strand, SubmitBlock, TopLevel,
};

/// Write a top-level record, including its `Name ::=` header.
pub fn write_top_level<W: Write>(out: &mut W, top: &TopLevel) -> io::Result<()> {
    let mut w = Printer::new(out);
    match top {
        TopLevel::Submit(submit) => {
            w.raw("Seq-submit ::= ")?;
            w.submit(submit)?;
        }
        TopLevel::Entry(entry) => {
            w.raw("Seq-entry ::= ")?;
            w.entry(entry)?;
        }
    }
    w.raw("\n")?;
    Ok(())
}

struct Printer<'a, W: Write> {
    out: &'a mut W,
    indent: usize,
}

impl<'a, W: Write> Printer<'a, W> {
    fn new(out: &'a mut W) -> Self {
        Self { out, indent: 0 }
    }

    fn raw(&mut self, s: &str) -> io::Result<()> {
        self.out.write_all(s.as_bytes())
    }

    fn line_start(&mut self) -> io::Result<()> {
        self.raw("\n")?;
        for _ in 0..self.indent {
            self.raw("  ")?;
        }
        Ok(())
    }

    fn string(&mut self, s: &str) -> io::Result<()> {
        self.raw("\"")?;
        self.raw(&s.replace('"', "\"\""))?;
        self.raw("\"")
    }

    /// Write `{ f(0), f(1), ... }` with one field per line.
    fn block<F>(&mut self, count: usize, mut f: F) -> io::Result<()>
    where
        F: FnMut(&mut Self, usize) -> io::Result<()>,
    {
        if count == 0 {
            return self.raw("{ }");
        }
        self.raw("{")?;
        self.indent += 1;
        for i in 0..count {
            self.line_start()?;
            f(self, i)?;
            if i + 1 < count {
                self.raw(",")?;
            }
        }
        self.indent -= 1;
        self.line_start()?;
        self.raw("}")
    }

    fn submit(&mut self, submit: &SeqSubmit) -> io::Result<()> {
        self.block(2, |w, i| match i {
            0 => {
                w.raw("sub ")?;
                w.submit_block(&submit.block)
            }
            _ => {
                w.raw("data ")?;
                w.block(submit.entries.len(), |w, i| w.entry(&submit.entries[i]))
            }
        })
    }

    fn submit_block(&mut self, block: &SubmitBlock) -> io::Result<()> {
        let mut fields: Vec<&str> = Vec::new();
        if block.contact.is_some() {
            fields.push("contact");
        }
        if !block.authors.is_empty() {
            fields.push("authors");
        }
        if block.tool.is_some() {
            fields.push("tool");
        }
        self.block(fields.len(), |w, i| match fields[i] {
            "contact" => {
                let contact = block.contact.as_ref().expect("checked above");
                w.raw("contact ")?;
                let n = 1 + usize::from(contact.email.is_some());
                w.block(n, |w, j| match j {
                    0 => {
                        w.raw("name ")?;
                        w.string(&contact.name)
                    }
                    _ => {
                        w.raw("email ")?;
                        w.string(contact.email.as_deref().expect("checked above"))
                    }
                })
            }
            "authors" => {
                w.raw("authors ")?;
                w.block(block.authors.len(), |w, j| w.string(&block.authors[j]))
            }
            _ => {
                w.raw("tool ")?;
                w.string(block.tool.as_deref().expect("checked above"))
            }
        })
    }

    fn entry(&mut self, entry: &SeqEntry) -> io::Result<()> {
        match entry {
            SeqEntry::Seq(seq) => {
                self.raw("seq ")?;
                self.bioseq(seq)
            }
            SeqEntry::Set(set) => {
                self.raw("set ")?;
                self.set(set)
            }
        }
    }

    fn set(&mut self, set: &BioseqSet) -> io::Result<()> {
        let mut fields: Vec<&str> = vec!["class"];
        if !set.descr.is_empty() {
            fields.push("descr");
        }
        if !set.annot.is_empty() {
            fields.push("annot");
        }
        fields.push("seq-set");
        self.block(fields.len(), |w, i| match fields[i] {
            "class" => {
                w.raw("class ")?;
                w.raw(set.class.as_token())
            }
            "descr" => {
                w.raw("descr ")?;
                w.descr(&set.descr)
            }
            "annot" => {
                w.raw("annot ")?;
                w.annots(&set.annot)
            }
            _ => {
                w.raw("seq-set ")?;
                w.block(set.seq_set.len(), |w, j| match &set.seq_set[j] {
                    SetMember::Entry(entry) => w.entry(entry),
                    SetMember::Deferred { offset, .. } => Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("deferred set member at offset {} was never extended", offset),
                    )),
                })
            }
        })
    }

    fn bioseq(&mut self, seq: &Bioseq) -> io::Result<()> {
        let mut fields: Vec<&str> = vec!["id", "inst"];
        if !seq.descr.is_empty() {
            fields.push("descr");
        }
        if !seq.annot.is_empty() {
            fields.push("annot");
        }
        self.block(fields.len(), |w, i| match fields[i] {
            "id" => {
                w.raw("id ")?;
                w.string(&seq.id)
            }
            "inst" => {
                w.raw("inst ")?;
                w.inst(&seq.inst)
            }
            "descr" => {
                w.raw("descr ")?;
                w.descr(&seq.descr)
            }
            _ => {
                w.raw("annot ")?;
                w.annots(&seq.annot)
            }
        })
    }

    fn inst(&mut self, inst: &SeqInst) -> io::Result<()> {
        let n = 2 + usize::from(inst.data.is_some());
        self.block(n, |w, i| match i {
            0 => {
                w.raw("mol ")?;
                w.raw(inst.mol.as_token())
            }
            1 => {
                w.raw("length ")?;
                w.raw(&inst.length.to_string())
            }
            _ => {
                w.raw("seq-data ")?;
                w.string(inst.data.as_deref().expect("checked above"))
            }
        })
    }

    fn descr(&mut self, descr: &[SeqDesc]) -> io::Result<()> {
        self.block(descr.len(), |w, i| match &descr[i] {
            SeqDesc::Title(t) => {
                w.raw("title ")?;
                w.string(t)
            }
            SeqDesc::Comment(c) => {
                w.raw("comment ")?;
                w.string(c)
            }
            SeqDesc::User(u) => {
                w.raw("user ")?;
                w.string(u)
            }
            SeqDesc::MolInfo(info) => {
                w.raw("molinfo ")?;
                w.molinfo(info)
            }
            SeqDesc::Source(src) => {
                w.raw("source ")?;
                w.biosource(src)
            }
            SeqDesc::Pub(p) => {
                w.raw("pub ")?;
                w.pubdesc(p)
            }
        })
    }

    fn molinfo(&mut self, info: &MolInfo) -> io::Result<()> {
        let n = 1 + usize::from(info.completeness.is_some());
        self.block(n, |w, i| match i {
            0 => {
                w.raw("biomol ")?;
                w.raw(&info.biomol)
            }
            _ => {
                w.raw("completeness ")?;
                w.raw(info.completeness.as_deref().expect("checked above"))
            }
        })
    }

    fn biosource(&mut self, src: &BioSource) -> io::Result<()> {
        let n = 2 + usize::from(!src.subtype.is_empty());
        self.block(n, |w, i| match i {
            0 => {
                w.raw("genome ")?;
                w.raw(src.genome.as_token())
            }
            1 => {
                w.raw("org ")?;
                let org = &src.org;
                let m =
                    1 + usize::from(org.lineage.is_some()) + usize::from(!org.orgmod.is_empty());
                w.block(m, |w, j| {
                    if j == 0 {
                        w.raw("taxname ")?;
                        return w.string(&org.taxname);
                    }
                    if j == 1 && org.lineage.is_some() {
                        w.raw("lineage ")?;
                        return w.string(org.lineage.as_deref().expect("checked above"));
                    }
                    w.raw("orgmod ")?;
                    w.block(org.orgmod.len(), |w, k| {
                        let m = &org.orgmod[k];
                        w.block(2, |w, f| match f {
                            0 => {
                                w.raw("subtype ")?;
                                w.raw(&m.subtype)
                            }
                            _ => {
                                w.raw("subname ")?;
                                w.string(&m.subname)
                            }
                        })
                    })
                })
            }
            _ => {
                w.raw("subtype ")?;
                w.block(src.subtype.len(), |w, k| {
                    let s = &src.subtype[k];
                    w.block(2, |w, f| match f {
                        0 => {
                            w.raw("subtype ")?;
                            w.raw(&s.subtype)
                        }
                        _ => {
                            w.raw("name ")?;
                            w.string(&s.name)
                        }
                    })
                })
            }
        })
    }

    fn pubdesc(&mut self, p: &Pubdesc) -> io::Result<()> {
        let n = 1 + usize::from(!p.authors.is_empty());
        self.block(n, |w, i| match i {
            0 => {
                w.raw("title ")?;
                w.string(&p.title)
            }
            _ => {
                w.raw("authors ")?;
                w.block(p.authors.len(), |w, j| w.string(&p.authors[j]))
            }
        })
    }

    fn annots(&mut self, annots: &[SeqAnnot]) -> io::Result<()> {
        self.block(annots.len(), |w, i| {
            w.block(1, |w, _| {
                w.raw("ftable ")?;
                let ftable = &annots[i].ftable;
                w.block(ftable.len(), |w, j| w.feat(&ftable[j]))
            })
        })
    }

    fn feat(&mut self, feat: &SeqFeat) -> io::Result<()> {
        let mut fields: Vec<&str> = vec!["data", "location"];
        if feat.product.is_some() {
            fields.push("product");
        }
        if feat.comment.is_some() {
            fields.push("comment");
        }
        if !feat.quals.is_empty() {
            fields.push("qual");
        }
        self.block(fields.len(), |w, i| match fields[i] {
            "data" => {
                w.raw("data ")?;
                w.raw(feat.kind.as_token())
            }
            "location" => {
                w.raw("location ")?;
                w.loc(&feat.location)
            }
            "product" => {
                w.raw("product ")?;
                w.string(feat.product.as_deref().expect("checked above"))
            }
            "comment" => {
                w.raw("comment ")?;
                w.string(feat.comment.as_deref().expect("checked above"))
            }
            _ => {
                w.raw("qual ")?;
                w.block(feat.quals.len(), |w, j| {
                    let (k, v) = &feat.quals[j];
                    w.block(2, |w, f| match f {
                        0 => {
                            w.raw("qual ")?;
                            w.string(k)
                        }
                        _ => {
                            w.raw("val ")?;
                            w.string(v)
                        }
                    })
                })
            }
        })
    }

    fn loc(&mut self, loc: &SeqLoc) -> io::Result<()> {
        let n = 3 + usize::from(loc.strand != Strand::Unknown);
        self.block(n, |w, i| match i {
            0 => {
                w.raw("id ")?;
                w.string(&loc.id)
            }
            1 => {
                w.raw("from ")?;
                w.raw(&loc.from.to_string())
            }
            2 => {
                w.raw("to ")?;
                w.raw(&loc.to.to_string())
            }
            _ => {
                w.raw("strand ")?;
                w.raw(loc.strand.as_token())
            }
        })
    }
}
