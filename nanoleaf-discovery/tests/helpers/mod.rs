//! Packet fixtures shaped like the ones Nanoleaf controllers send

/// A controller as seen on the wire
#[derive(Debug, Clone)]
pub struct ControllerFixture {
    pub ip: String,
    pub service_type: String,
    pub name: String,
    pub uuid: String,
}

impl ControllerFixture {
    pub fn new(ip: &str, service_type: &str, name: &str) -> Self {
        Self {
            ip: ip.to_string(),
            service_type: service_type.to_string(),
            name: name.to_string(),
            uuid: format!("uuid:{}", ip.replace('.', "")),
        }
    }

    pub fn location(&self) -> String {
        format!("http://{}:16021", self.ip)
    }

    /// Reply to an M-SEARCH
    pub fn search_reply(&self) -> String {
        format!(
            "HTTP/1.1 200 OK\r\n\
             Cache-Control: max-age=60\r\n\
             Ext: \r\n\
             ST: {}\r\n\
             USN: {}\r\n\
             Location: {}\r\n\
             nl-deviceid: 5E:2E:EA:11:22:33\r\n\
             nl-devicename: {}\r\n\r\n",
            self.service_type,
            self.uuid,
            self.location(),
            self.name
        )
    }

    /// Presence notification with the given `NTS`
    pub fn notify(&self, nts: &str) -> String {
        format!(
            "NOTIFY * HTTP/1.1\r\n\
             Host: 239.255.255.250:1900\r\n\
             Cache-Control: max-age=60\r\n\
             Location: {}\r\n\
             NT: {}\r\n\
             NTS: {}\r\n\
             USN: {}\r\n\
             nl-devicename: {}\r\n\r\n",
            self.location(),
            self.service_type,
            nts,
            self.uuid,
            self.name
        )
    }
}
