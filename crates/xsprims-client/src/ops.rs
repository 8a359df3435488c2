//! Typed xenstore operations, each a single request/reply exchange.

use xsprims_frame::msg_type::{
    XS_DIRECTORY, XS_GET_DOMAIN_PATH, XS_GET_PERMS, XS_MKDIR, XS_READ, XS_RM, XS_UNWATCH, XS_WATCH,
    XS_WRITE,
};
use xsprims_transport::EventChannelOps;

use crate::error::{ClientError, Result};
use crate::watch::WatchEvent;
use crate::xenbus::XenBus;

/// Children of a directory node, as the host sent them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    raw: Vec<u8>,
}

impl DirectoryListing {
    /// The nul-separated names, exactly as received.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Byte count of the listing, nul separators included.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Child names in host order.
    ///
    /// A name that is not UTF-8 is yielded as an error in its place; use
    /// [`as_bytes`](Self::as_bytes) to get at it.
    pub fn names(&self) -> impl Iterator<Item = Result<&str>> {
        nul_separated(&self.raw)
    }
}

/// Non-empty fields of a nul-separated payload.
fn nul_separated(bytes: &[u8]) -> impl Iterator<Item = Result<&str>> {
    bytes
        .split(|b| *b == 0)
        .filter(|field| !field.is_empty())
        .map(|field| Ok(std::str::from_utf8(field)?))
}

/// Append `field` and its nul terminator to a request payload.
fn push_field(payload: &mut Vec<u8>, what: &str, field: &str) -> Result<()> {
    if field.as_bytes().contains(&0) {
        return Err(ClientError::InvalidArgument(format!("{what} contains a nul byte")));
    }
    payload.extend_from_slice(field.as_bytes());
    payload.push(0);
    Ok(())
}

fn path_query(path: &str) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(path.len() + 1);
    push_field(&mut payload, "path", path)?;
    Ok(payload)
}

fn pair_query(what: &str, first: &str, second: &str) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(first.len() + second.len() + 2);
    push_field(&mut payload, "path", first)?;
    push_field(&mut payload, what, second)?;
    Ok(payload)
}

impl<'a, H: EventChannelOps> XenBus<'a, H> {
    /// Read the value stored at `path`.
    ///
    /// The value ends at its first nul byte.
    pub fn read(&mut self, path: &str) -> Result<String> {
        let query = path_query(path)?;
        let reply = self.send(XS_READ, &query)?.expect_type(XS_READ)?;
        Ok(reply.text()?.to_string())
    }

    /// List the children of `path`.
    pub fn list(&mut self, path: &str) -> Result<DirectoryListing> {
        let query = path_query(path)?;
        let reply = self.send(XS_DIRECTORY, &query)?.expect_type(XS_DIRECTORY)?;
        Ok(DirectoryListing {
            raw: reply.payload().to_vec(),
        })
    }

    /// Store `value` at `path`, creating the node if needed.
    pub fn write(&mut self, path: &str, value: &str) -> Result<()> {
        let query = pair_query("value", path, value)?;
        self.send(XS_WRITE, &query)?.expect_type(XS_WRITE)?;
        Ok(())
    }

    /// Register a watch on `path`, then block until it fires.
    ///
    /// The host fires every new watch once straight away, so this normally
    /// returns that initial event.
    pub fn watch(&mut self, path: &str, token: &str) -> Result<WatchEvent> {
        let query = pair_query("token", path, token)?;
        self.send(XS_WATCH, &query)?.expect_type(XS_WATCH)?;
        self.next_watch_event()
    }

    pub fn unwatch(&mut self, path: &str, token: &str) -> Result<()> {
        let query = pair_query("token", path, token)?;
        self.send(XS_UNWATCH, &query)?.expect_type(XS_UNWATCH)?;
        Ok(())
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let query = path_query(path)?;
        self.send(XS_MKDIR, &query)?.expect_type(XS_MKDIR)?;
        Ok(())
    }

    /// Remove `path` and everything below it.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let query = path_query(path)?;
        self.send(XS_RM, &query)?.expect_type(XS_RM)?;
        Ok(())
    }

    /// The home path of domain `domid`, e.g. `/local/domain/3`.
    pub fn get_domain_path(&mut self, domid: u32) -> Result<String> {
        let query = path_query(&domid.to_string())?;
        let reply = self
            .send(XS_GET_DOMAIN_PATH, &query)?
            .expect_type(XS_GET_DOMAIN_PATH)?;
        Ok(reply.text()?.to_string())
    }

    /// Permission entries of `path` in host order (`n0`, `r3`, ...).
    pub fn get_permissions(&mut self, path: &str) -> Result<Vec<String>> {
        let query = path_query(path)?;
        let reply = self.send(XS_GET_PERMS, &query)?.expect_type(XS_GET_PERMS)?;
        nul_separated(reply.payload())
            .map(|entry| entry.map(str::to_string))
            .collect()
    }
}
