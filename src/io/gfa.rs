use crate::error::Result;
use crate::graph::assembly_graph::{AssemblyGraph, EdgeId};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct GfaWriter<W: Write> {
    writer: W,
}

impl GfaWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> GfaWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Segment name and orientation of `e`: conjugate pairs share a segment.
    fn oriented(graph: &AssemblyGraph, e: EdgeId) -> (usize, char) {
        let conj = graph.conjugate(e);
        if e <= conj {
            (e.0, '+')
        } else {
            (conj.0, '-')
        }
    }

    pub fn write_segments(&mut self, graph: &AssemblyGraph) -> Result<usize> {
        writeln!(self.writer, "H\tVN:Z:1.0")?;
        let mut count = 0;
        for e in graph.edge_pairs() {
            writeln!(
                self.writer,
                "S\t{}\t{}\tKC:i:{}",
                e.0,
                String::from_utf8_lossy(graph.sequence(e)),
                graph.raw_coverage(e)
            )?;
            count += 1;
        }
        Ok(count)
    }

    /// One link per adjacent edge pair, skipping the mirror image of a link
    /// already written.
    pub fn write_links(&mut self, graph: &AssemblyGraph) -> Result<usize> {
        let overlap = graph.k() - 1;
        let mut count = 0;
        for v in graph.vertices() {
            for &from in graph.incoming(v) {
                for &to in graph.outgoing(v) {
                    let mirror = (graph.conjugate(to), graph.conjugate(from));
                    if (from, to) > mirror {
                        continue;
                    }
                    let (a, a_dir) = Self::oriented(graph, from);
                    let (b, b_dir) = Self::oriented(graph, to);
                    writeln!(self.writer, "L\t{}\t{}\t{}\t{}\t{}M", a, a_dir, b, b_dir, overlap)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Writes the whole graph as GFA 1.0.
pub fn write_graph_gfa(graph: &AssemblyGraph, path: &Path) -> Result<()> {
    let mut writer = GfaWriter::create(path)?;
    writer.write_segments(graph)?;
    writer.write_links(graph)?;
    writer.into_inner()?;
    Ok(())
}
