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

use chrono::Duration;

use crate::common::console::{CvarError, CvarRegistry};

pub fn register_cvars(cvars: &CvarRegistry) -> Result<(), CvarError> {
    cvars.register_userinfo("name", "UnnamedSoldier")?;
    cvars.register_userinfo("rate", "5000")?;
    cvars.register_userinfo("snaps", "20")?;
    cvars.register("cl_maxpackets", "30")?;
    cvars.register("cl_timenudge", "0")?;
    cvars.register("cl_shownet", "0")?;
    cvars.register("cl_maxprocesstime", "50")?;
    cvars.register("net_qport", "0")?;
    cvars.register("protocol", "17")?;

    Ok(())
}

/// Connection settings read once from the cvars when a session starts.
#[derive(Clone, Debug)]
pub struct ClientSettings {
    pub max_packets: u32,
    pub time_nudge: i32,
    pub show_net: bool,
    pub qport: u16,
    pub protocol: u32,

    /// Upper bound on the time spent receiving in a single `process` call.
    pub max_process_time: Duration,
}

impl ClientSettings {
    pub fn from_cvars(cvars: &CvarRegistry) -> Result<ClientSettings, CvarError> {
        // a qport of 0 asks for a random one
        let qport = match (cvars.get_value("net_qport")? as u16) {
            0 => rand::random::<u16>() | 1,
            q => q,
        };

        Ok(ClientSettings {
            max_packets: (cvars.get_value("cl_maxpackets")? as u32).max(15).min(125),
            time_nudge: (cvars.get_value("cl_timenudge")? as i32).max(-30).min(30),
            show_net: cvars.get_value("cl_shownet")? != 0.0,
            qport,
            protocol: cvars.get_value("protocol")? as u32,
            max_process_time: Duration::milliseconds(cvars.get_value("cl_maxprocesstime")? as i64),
        })
    }
}

impl Default for ClientSettings {
    fn default() -> ClientSettings {
        ClientSettings {
            max_packets: 30,
            time_nudge: 0,
            show_net: false,
            qport: 1,
            protocol: 17,
            max_process_time: Duration::milliseconds(50),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_settings_from_cvars() {
        let cvars = CvarRegistry::new();
        register_cvars(&cvars).unwrap();
        cvars.set("net_qport", "4242").unwrap();
        cvars.set("cl_maxpackets", "500").unwrap();
        cvars.set("protocol", "8").unwrap();

        let settings = ClientSettings::from_cvars(&cvars).unwrap();
        assert_eq!(settings.qport, 4242);
        assert_eq!(settings.max_packets, 125);
        assert_eq!(settings.protocol, 8);
        assert_eq!(settings.max_process_time, Duration::milliseconds(50));
    }

    #[test]
    fn test_random_qport() {
        let cvars = CvarRegistry::new();
        register_cvars(&cvars).unwrap();
        assert_ne!(ClientSettings::from_cvars(&cvars).unwrap().qport, 0);
    }

    #[test]
    fn test_userinfo_cvars() {
        let cvars = CvarRegistry::new();
        register_cvars(&cvars).unwrap();
        cvars.take_userinfo_modified();

        cvars.set("name", "Cpl. Upham").unwrap();
        assert!(cvars.take_userinfo_modified());

        let info = cvars.userinfo();
        assert_eq!(info.get("name"), Some("Cpl. Upham"));
        assert_eq!(info.get("rate"), Some("5000"));
        assert_eq!(info.get("cl_maxpackets"), None);
    }
}
