use super::BlockCursor;

impl BlockCursor {
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size: block_size as usize,
            current_block: 0,
            current_byte: 0,
        }
    }

    pub fn advance(&mut self, bytes: u64) -> u64 {
        let remaining_bytes = (self.block_size - self.current_byte) as u64;
        if bytes < remaining_bytes {
            self.current_byte += bytes as usize;
            return self.position();
        }
        let overflow = bytes - remaining_bytes;
        self.current_block += overflow / self.block_size as u64 + 1;
        self.current_byte = (overflow % self.block_size as u64) as usize;
        self.position()
    }

    pub fn set(&mut self, bytes: u64) -> u64 {
        self.reset();
        self.advance(bytes)
    }

    pub fn reset(&mut self) {
        self.current_block = 0;
        self.current_byte = 0;
    }

    /// Logical block under the cursor
    pub fn block(&self) -> u64 {
        self.current_block
    }

    /// Byte offset inside the current block
    pub fn byte(&self) -> usize {
        self.current_byte
    }

    /// Bytes left in the current block
    pub fn remaining(&self) -> usize {
        self.block_size - self.current_byte
    }

    pub fn position(&self) -> u64 {
        self.current_block * self.block_size as u64 + self.current_byte as u64
    }
}

#[cfg(test)]
mod tests {
    use super::BlockCursor;

    #[test]
    fn stays_inside_block() {
        let mut cursor = BlockCursor::new(512);
        assert_eq![(cursor.block(), cursor.byte()), (0, 0)];
        assert_eq![cursor.advance(300), 300];
        assert_eq![cursor.advance(211), 511];
        assert_eq![(cursor.block(), cursor.byte()), (0, 511)];
        assert_eq![cursor.remaining(), 1];
    }

    #[test]
    fn crosses_blocks() {
        let mut cursor = BlockCursor::new(512);
        cursor.advance(600);
        assert_eq![(cursor.block(), cursor.byte()), (1, 88)];
        assert_eq![cursor.advance(1000), 1600];
        assert_eq![(cursor.block(), cursor.byte()), (3, 64)];
        assert_eq![cursor.remaining(), 448];
    }

    #[test]
    fn lands_on_boundaries() {
        let mut cursor = BlockCursor::new(512);
        cursor.advance(512);
        assert_eq![(cursor.block(), cursor.byte()), (1, 0)];
        cursor.advance(1024);
        assert_eq![(cursor.block(), cursor.byte()), (3, 0)];
        assert_eq![cursor.remaining(), 512];
    }

    #[test]
    fn set_is_absolute() {
        let mut cursor = BlockCursor::new(1024);
        cursor.advance(5000);
        assert_eq![cursor.set(1030), 1030];
        assert_eq![(cursor.block(), cursor.byte()), (1, 6)];
        cursor.reset();
        assert_eq![cursor.position(), 0];
    }
}
