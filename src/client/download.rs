// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use crate::common::{
    msg::Msg,
    net::{NetError, NetErrorKind, MAX_MSGLEN},
};

/// What a download block meant for the transfer.
#[derive(Clone, Debug, PartialEq)]
pub enum DownloadEvent {
    /// More blocks are expected. The server waits for this acknowledgement.
    Progress { ack: String },
    /// The file is complete.
    Complete { ack: String, data: Vec<u8> },
    /// The server refused the download.
    Failed { reason: String },
}

/// A file transfer over the `svc_download` channel.
#[derive(Clone, Debug)]
pub struct Download {
    name: String,
    block: u16,
    size: Option<usize>,
    data: Vec<u8>,
}

impl Download {
    pub fn new<S>(name: S) -> Download
    where
        S: Into<String>,
    {
        Download {
            name: name.into(),
            block: 0,
            size: None,
            data: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size announced by the server in the first block.
    pub fn size(&self) -> Option<usize> {
        self.size
    }

    pub fn received(&self) -> usize {
        self.data.len()
    }

    /// The command requesting this download.
    pub fn request(&self) -> String {
        format!("download {}", self.name)
    }

    /// Parse one `svc_download` body.
    ///
    /// The whole block is always consumed. A block other than the expected one is an
    /// error but leaves the transfer intact.
    pub fn receive_block(&mut self, msg: &mut Msg) -> Result<DownloadEvent, NetError> {
        let block = msg.read_short()? as u16;

        if block == 0 {
            let size = msg.read_long()?;
            if size < 0 {
                let reason = msg.read_string()?;
                return Ok(DownloadEvent::Failed { reason });
            }

            self.size = Some(size as usize);
        }

        let len = msg.read_short()?;
        if len < 0 || len as usize > MAX_MSGLEN {
            return Err(NetError::invalid_data(format!("bad download block size {}", len)));
        }
        let chunk = msg.read_data(len as usize)?;

        if block != self.block {
            return Err(NetErrorKind::DownloadBlock {
                expected: self.block,
                received: block,
            }
            .into());
        }

        self.data.extend_from_slice(&chunk);
        self.block = self.block.wrapping_add(1);
        trace!("{}: block {}, {} bytes", self.name, block, self.data.len());

        let ack = format!("nextdl {}", self.block);
        if chunk.is_empty() {
            debug!("Download of {} complete ({} bytes)", self.name, self.data.len());
            return Ok(DownloadEvent::Complete {
                ack,
                data: std::mem::replace(&mut self.data, Vec::new()),
            });
        }

        Ok(DownloadEvent::Progress { ack })
    }
}

/// Write one `svc_download` body, as the server does. `size` is sent with block 0 only;
/// a negative size carries `error` instead of data.
pub fn write_block(
    msg: &mut Msg,
    block: u16,
    size: i32,
    chunk: &[u8],
    error: Option<&str>,
) -> Result<(), NetError> {
    msg.write_short(block as i16)?;
    if block == 0 {
        msg.write_long(size)?;
        if size < 0 {
            return msg.write_string(error.unwrap_or(""));
        }
    }

    msg.write_short(chunk.len() as i16)?;
    msg.write_data(chunk)
}
