/// Splits `ident=value` pairs, separated by whitespace or commas.
pub struct Tokenizer<'a> {
    running_str: &'a str,
    idx: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(inp: &'a str) -> Self {
        let running_str = inp.trim_start();
        Self {
            running_str,
            idx: inp.len() - running_str.len(),
        }
    }

    pub fn current_index(&self) -> usize {
        self.idx
    }

    fn next_token<P1, P2, P3>(
        &mut self,
        find_pattern: P1,
        starts_with_pattern: P2,
        strip_pattern: P3,
    ) -> Option<(usize, &'a str)>
    where
        P1: FnMut(char) -> bool,
        P2: FnMut(char) -> bool,
        P3: FnMut(char) -> bool,
    {
        if self.running_str.is_empty() {
            return None;
        }

        let i = self.running_str.find(find_pattern)?;

        let (value, rest) = self.running_str.split_at(i);

        if value.is_empty() {
            return None;
        }

        let rest_len = rest.len();

        self.running_str = rest
            .strip_prefix(starts_with_pattern)?
            .trim_start_matches(strip_pattern);

        let pos_start = self.idx;
        self.idx += i + (rest_len - self.running_str.len());

        Some((pos_start, value.trim_end()))
    }

    pub fn next_ident(&mut self) -> Option<(usize, &'a str)> {
        self.next_token(
            |c| !c.is_alphanumeric() && c != '_',
            |c| c == '=',
            |c| c.is_whitespace(),
        )
    }

    pub fn next_value(&mut self) -> Option<(usize, &'a str)> {
        self.next_token(
            |c| c.is_whitespace() || c == ',' || c == '=',
            |c| c.is_whitespace() || c == ',',
            |c| c.is_whitespace() || c == ',',
        )
        .or_else(|| {
            if self.running_str.is_empty() {
                return None;
            }
            let rest = self.running_str;
            self.running_str = "";
            let pos_start = self.idx;
            self.idx += rest.len();
            Some((pos_start, rest))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    testing::test! {
        fn test_tokens() {
            let mut tokenizer = Tokenizer::new("  max_depth=64,resource_data=false");
            assert_eq!(tokenizer.next_ident(), Some((2, "max_depth")));
            assert_eq!(tokenizer.next_value(), Some((12, "64")));
            assert_eq!(tokenizer.next_ident(), Some((15, "resource_data")));
            assert_eq!(tokenizer.next_value(), Some((29, "false")));
            assert_eq!(tokenizer.next_ident(), None);
            assert_eq!(tokenizer.next_value(), None);
        }
    }
}
