/// CJK detection and GB18030 re-encoding of entry names.
pub mod transcode;
