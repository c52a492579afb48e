//! flush 単位のバイト列をトランスポート用チャンクに分割する
//!
//! 各チャンクは同じ凍結済みバッファへの `Bytes` スライスで、コピーは発生しない。

use bytes::Bytes;

/// flush バイト列を `max_chunk_size` 以下のチャンク列に分割する
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chunk_size: usize,
}

impl Chunker {
    /// # 引数
    /// - `max_chunk_size`: 1 回のトランスポート書き込みの最大バイト数（0 は 1 として扱う）
    pub fn new(max_chunk_size: usize) -> Self {
        Chunker {
            max_chunk_size: max_chunk_size.max(1),
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// # 戻り値
    /// 元の順序のチャンク列。空の入力なら空。
    pub fn split(&self, mut bytes: Bytes) -> Vec<Bytes> {
        let mut chunks = Vec::with_capacity(bytes.len().div_ceil(self.max_chunk_size));
        while bytes.len() > self.max_chunk_size {
            chunks.push(bytes.split_to(self.max_chunk_size));
        }
        if !bytes.is_empty() {
            chunks.push(bytes);
        }
        chunks
    }
}
