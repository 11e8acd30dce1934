use crate::domain::SearchResult;

const BLOCK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssembledContext {
    pub text: String,
    /// Sources of the admitted blocks, first appearance order, no repeats.
    pub sources: Vec<String>,
    pub block_count: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }
}

/// Joins retrieved passages into one source-attributed block of text that
/// never exceeds `max_chars` characters.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn render_block(result: &SearchResult) -> String {
        format!(
            "[Source: {} #{}]\n{}",
            result.chunk.source_id, result.chunk.sequence_index, result.chunk.text
        )
    }

    /// Admits blocks in relevance order while they fit. A block that would
    /// overflow is dropped whole; smaller blocks after it are still tried.
    pub fn assemble<'a, I>(&self, results: I) -> AssembledContext
    where
        I: IntoIterator<Item = &'a SearchResult>,
    {
        let separator_len = BLOCK_SEPARATOR.chars().count();
        let mut context = AssembledContext::default();
        let mut used = 0;

        for result in results {
            let block = Self::render_block(result);
            let cost = block.chars().count()
                + if context.block_count > 0 { separator_len } else { 0 };
            if used + cost > self.max_chars {
                continue;
            }

            if context.block_count > 0 {
                context.text.push_str(BLOCK_SEPARATOR);
            }
            context.text.push_str(&block);
            context.block_count += 1;
            used += cost;

            if !context.sources.contains(&result.chunk.source_id) {
                context.sources.push(result.chunk.source_id.clone());
            }
        }

        context
    }
}
