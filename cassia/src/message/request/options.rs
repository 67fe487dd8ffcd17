//! `OPTIONS`: an empty-body request that asks the server for [`super::super::response::supported::Supported`] options.
use bytes::BufMut;

pub struct Options;

impl Options {
    pub fn encode(&self, _buf: &mut impl BufMut) {
        // empty body
    }
}
