/**
 * XML wire format for the WebDAV surface: PROPFIND/PROPPATCH requests and
 * responses, LOCK/UNLOCK bodies, and `error` condition bodies. Built on
 * `quick-xml`, the same crate the teacher's original `webdav_adapter`
 * reached for, using its event-writer API.
 */
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::Writer;
use thiserror::Error;

use crate::application::ports::object_store_port::ObjectStat;
use crate::domain::entities::lock::{Lock, LockDepth, LockKind, LockOwner};
use crate::domain::entities::property::{DeadProperty, PropertyName};

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),
    #[error("XML write error: {0}")]
    Write(String),
    #[error("invalid request body: {0}")]
    InvalidRequest(String),
}

pub type XmlResult<T> = Result<T, XmlError>;

const DAV_NS: &str = "DAV:";

#[derive(Debug, Clone)]
pub enum PropFindRequest {
    AllProps,
    PropNames(Vec<PropertyName>),
    PropNameOnly,
}

/// A single resource's properties, ready to be rendered into one
/// `d:response` element of a Multi-Status body.
#[derive(Debug, Clone)]
pub struct PropFindEntry {
    pub href: String,
    pub stat: ObjectStat,
    pub dead_properties: Vec<DeadProperty>,
}

pub struct WebDavXml;

impl WebDavXml {
    pub fn parse_propfind(body: &[u8]) -> XmlResult<PropFindRequest> {
        if body.is_empty() {
            // An empty body is a valid PROPFIND request and means "allprop".
            return Ok(PropFindRequest::AllProps);
        }

        let mut reader = NsReader::from_reader(body);
        reader.config_mut().trim_text(true);

        let mut inside_propfind = false;
        let mut inside_prop = false;
        let mut names = Vec::new();
        let mut result = None;

        loop {
            match reader.read_resolved_event() {
                Ok((ns, Event::Start(e))) | Ok((ns, Event::Empty(e))) => {
                    let local = local_name(&e);
                    if local == "propfind" {
                        inside_propfind = true;
                    } else if inside_propfind {
                        match local.as_str() {
                            "allprop" => result = Some(PropFindRequest::AllProps),
                            "propname" => result = Some(PropFindRequest::PropNameOnly),
                            "prop" => inside_prop = true,
                            _ if inside_prop => names.push(PropertyName::new(resolved_namespace(ns), local)),
                            _ => {}
                        }
                    }
                }
                Ok((_, Event::End(e))) => {
                    let local = local_name(&e);
                    if local == "propfind" {
                        inside_propfind = false;
                    } else if local == "prop" {
                        inside_prop = false;
                    }
                }
                Ok((_, Event::Eof)) => break,
                Err(e) => return Err(XmlError::Parse(e.to_string())),
                _ => {}
            }
        }

        if !names.is_empty() {
            return Ok(PropFindRequest::PropNames(names));
        }

        result.ok_or_else(|| XmlError::InvalidRequest("missing allprop/propname/prop in propfind body".to_string()))
    }

    pub fn generate_propfind_response(entries: &[PropFindEntry], request: &PropFindRequest) -> XmlResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());

        let mut multistatus = BytesStart::new("d:multistatus");
        multistatus.push_attribute(("xmlns:d", DAV_NS));
        writer
            .write_event(Event::Start(multistatus))
            .map_err(xml_write_err)?;

        for entry in entries {
            Self::write_response(&mut writer, entry, request)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("d:multistatus")))
            .map_err(xml_write_err)?;

        Ok(writer.into_inner())
    }

    fn write_response(writer: &mut Writer<Vec<u8>>, entry: &PropFindEntry, request: &PropFindRequest) -> XmlResult<()> {
        writer.write_event(Event::Start(BytesStart::new("d:response"))).map_err(xml_write_err)?;
        write_text_element(writer, "d:href", &entry.href)?;

        writer.write_event(Event::Start(BytesStart::new("d:propstat"))).map_err(xml_write_err)?;
        writer.write_event(Event::Start(BytesStart::new("d:prop"))).map_err(xml_write_err)?;

        match request {
            PropFindRequest::AllProps => {
                Self::write_live_properties(writer, entry)?;
                for prop in &entry.dead_properties {
                    write_dead_property(writer, prop)?;
                }
            }
            PropFindRequest::PropNames(names) => {
                for name in names {
                    if name.is_dav_namespace() {
                        Self::write_live_property(writer, entry, &name.name)?;
                    } else if let Some(prop) = entry.dead_properties.iter().find(|p| p.name == *name) {
                        write_dead_property(writer, prop)?;
                    } else {
                        write_property_name_only(writer, name)?;
                    }
                }
            }
            PropFindRequest::PropNameOnly => {
                for name in ["resourcetype", "getcontentlength", "getlastmodified", "creationdate", "displayname", "getcontenttype"] {
                    writer
                        .write_event(Event::Empty(BytesStart::new(format!("d:{}", name))))
                        .map_err(xml_write_err)?;
                }
                for prop in &entry.dead_properties {
                    write_property_name_only(writer, &prop.name)?;
                }
            }
        }

        writer.write_event(Event::End(BytesEnd::new("d:prop"))).map_err(xml_write_err)?;
        write_text_element(writer, "d:status", "HTTP/1.1 200 OK")?;
        writer.write_event(Event::End(BytesEnd::new("d:propstat"))).map_err(xml_write_err)?;
        writer.write_event(Event::End(BytesEnd::new("d:response"))).map_err(xml_write_err)?;
        Ok(())
    }

    fn write_live_properties(writer: &mut Writer<Vec<u8>>, entry: &PropFindEntry) -> XmlResult<()> {
        for name in ["resourcetype", "getcontentlength", "getlastmodified", "creationdate", "displayname", "getcontenttype"] {
            Self::write_live_property(writer, entry, name)?;
        }
        Ok(())
    }

    fn write_live_property(writer: &mut Writer<Vec<u8>>, entry: &PropFindEntry, name: &str) -> XmlResult<()> {
        let stat = &entry.stat;
        match name {
            "resourcetype" => {
                writer.write_event(Event::Start(BytesStart::new("d:resourcetype"))).map_err(xml_write_err)?;
                if stat.is_collection {
                    writer.write_event(Event::Empty(BytesStart::new("d:collection"))).map_err(xml_write_err)?;
                }
                writer.write_event(Event::End(BytesEnd::new("d:resourcetype"))).map_err(xml_write_err)?;
            }
            "getcontentlength" if !stat.is_collection => {
                write_text_element(writer, "d:getcontentlength", &stat.size.to_string())?;
            }
            "getlastmodified" => write_text_element(writer, "d:getlastmodified", &stat.last_modified.to_rfc2822())?,
            "creationdate" => write_text_element(writer, "d:creationdate", &stat.created_at.to_rfc3339())?,
            "displayname" => {
                let display_name = entry.stat.path.file_name().unwrap_or("");
                write_text_element(writer, "d:displayname", display_name)?;
            }
            "getcontenttype" if !stat.is_collection => {
                write_text_element(writer, "d:getcontenttype", &stat.content_type)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Parses a PROPPATCH body into its ordered set/remove operations.
    pub fn parse_proppatch(body: &[u8]) -> XmlResult<Vec<crate::domain::repositories::property_repository::PropertyUpdate>> {
        use crate::domain::repositories::property_repository::PropertyUpdate;

        let mut reader = NsReader::from_reader(body);
        reader.config_mut().trim_text(true);

        let mut updates = Vec::new();
        let mut mode: Option<bool> = None; // Some(true) = set, Some(false) = remove
        let mut inside_prop = false;
        let mut current_name: Option<PropertyName> = None;
        let mut current_value = String::new();

        loop {
            match reader.read_resolved_event() {
                Ok((ns, Event::Start(e))) => {
                    let local = local_name(&e);
                    match local.as_str() {
                        "set" => mode = Some(true),
                        "remove" => mode = Some(false),
                        "prop" => inside_prop = true,
                        _ if inside_prop && current_name.is_none() => {
                            current_name = Some(PropertyName::new(resolved_namespace(ns), local));
                            current_value.clear();
                        }
                        _ => {}
                    }
                }
                Ok((ns, Event::Empty(e))) => {
                    let local = local_name(&e);
                    if inside_prop {
                        if let Some(mode) = mode {
                            let name = PropertyName::new(resolved_namespace(ns), local);
                            updates.push(if mode {
                                PropertyUpdate::Set { name, value: String::new() }
                            } else {
                                PropertyUpdate::Remove { name }
                            });
                        }
                    }
                }
                Ok((_, Event::Text(t))) => {
                    if current_name.is_some() {
                        current_value.push_str(&t.unescape().map_err(|e| XmlError::Parse(e.to_string()))?);
                    }
                }
                Ok((_, Event::End(e))) => {
                    let local = local_name(&e);
                    if local == "prop" {
                        inside_prop = false;
                    } else if current_name.as_ref().is_some_and(|n| n.name == local) {
                        if let (Some(mode), Some(name)) = (mode, current_name.take()) {
                            updates.push(if mode {
                                PropertyUpdate::Set { name, value: current_value.clone() }
                            } else {
                                PropertyUpdate::Remove { name }
                            });
                        }
                    } else if local == "set" || local == "remove" {
                        mode = None;
                    }
                }
                Ok((_, Event::Eof)) => break,
                Err(e) => return Err(XmlError::Parse(e.to_string())),
                _ => {}
            }
        }

        Ok(updates)
    }

    /// `statuses` is one `(property name, HTTP status)` pair per property
    /// named in the request, in any order; properties sharing a status are
    /// grouped into one `propstat`. Distinguishes 403 (rejected live
    /// property) from 409 (dead-property store failure) from 200.
    pub fn generate_proppatch_response(href: &str, statuses: &[(PropertyName, u16)]) -> XmlResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        let mut multistatus = BytesStart::new("d:multistatus");
        multistatus.push_attribute(("xmlns:d", DAV_NS));
        writer.write_event(Event::Start(multistatus)).map_err(xml_write_err)?;

        writer.write_event(Event::Start(BytesStart::new("d:response"))).map_err(xml_write_err)?;
        write_text_element(&mut writer, "d:href", href)?;

        let mut by_status: Vec<(u16, Vec<&PropertyName>)> = Vec::new();
        for (name, status) in statuses {
            match by_status.iter_mut().find(|(s, _)| s == status) {
                Some((_, names)) => names.push(name),
                None => by_status.push((*status, vec![name])),
            }
        }

        for (status, names) in &by_status {
            writer.write_event(Event::Start(BytesStart::new("d:propstat"))).map_err(xml_write_err)?;
            writer.write_event(Event::Start(BytesStart::new("d:prop"))).map_err(xml_write_err)?;
            for name in names {
                write_property_name_only(&mut writer, name)?;
            }
            writer.write_event(Event::End(BytesEnd::new("d:prop"))).map_err(xml_write_err)?;
            write_text_element(&mut writer, "d:status", &format!("HTTP/1.1 {} {}", status, reason_phrase(*status)))?;
            writer.write_event(Event::End(BytesEnd::new("d:propstat"))).map_err(xml_write_err)?;
        }

        writer.write_event(Event::End(BytesEnd::new("d:response"))).map_err(xml_write_err)?;
        writer.write_event(Event::End(BytesEnd::new("d:multistatus"))).map_err(xml_write_err)?;
        Ok(writer.into_inner())
    }

    /// Parses a LOCK request body's `<d:lockinfo>` into scope/owner. Depth
    /// and Timeout come from HTTP headers, not the body. Only called in
    /// new-lock mode (the caller already branched on the `If` header to
    /// pick refresh mode); an empty body here is the spec's "default to
    /// exclusive/write" case, not an error.
    pub fn parse_lockinfo(body: &[u8]) -> XmlResult<(LockKind, LockOwner)> {
        if body.is_empty() {
            return Ok((LockKind::Exclusive, LockOwner::Opaque(String::new())));
        }

        let mut reader = NsReader::from_reader(body);
        reader.config_mut().trim_text(true);

        let mut kind = LockKind::Exclusive;
        let mut owner_text = String::new();
        let mut inside_owner = false;
        let mut owner_has_markup = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    let local = local_name(&e);
                    match local.as_str() {
                        "exclusive" => kind = LockKind::Exclusive,
                        "shared" => kind = LockKind::Shared,
                        "owner" => inside_owner = true,
                        _ if inside_owner => owner_has_markup = true,
                        _ => {}
                    }
                }
                Ok(Event::Text(t)) if inside_owner => {
                    owner_text.push_str(&t.unescape().map_err(|e| XmlError::Parse(e.to_string()))?);
                }
                Ok(Event::End(e)) => {
                    if local_name(&e) == "owner" {
                        inside_owner = false;
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XmlError::Parse(e.to_string())),
                _ => {}
            }
        }

        let owner = if owner_text.is_empty() && !owner_has_markup {
            LockOwner::Opaque(String::new())
        } else {
            LockOwner::Opaque(owner_text)
        };

        Ok((kind, owner))
    }

    pub fn generate_lock_response(lock: &Lock, href: &str) -> XmlResult<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        let mut prop = BytesStart::new("d:prop");
        prop.push_attribute(("xmlns:d", DAV_NS));
        writer.write_event(Event::Start(prop)).map_err(xml_write_err)?;
        writer.write_event(Event::Start(BytesStart::new("d:lockdiscovery"))).map_err(xml_write_err)?;
        Self::write_activelock(&mut writer, lock, href)?;
        writer.write_event(Event::End(BytesEnd::new("d:lockdiscovery"))).map_err(xml_write_err)?;
        writer.write_event(Event::End(BytesEnd::new("d:prop"))).map_err(xml_write_err)?;
        Ok(writer.into_inner())
    }

    fn write_activelock(writer: &mut Writer<Vec<u8>>, lock: &Lock, href: &str) -> XmlResult<()> {
        writer.write_event(Event::Start(BytesStart::new("d:activelock"))).map_err(xml_write_err)?;

        writer.write_event(Event::Start(BytesStart::new("d:locktype"))).map_err(xml_write_err)?;
        writer.write_event(Event::Empty(BytesStart::new("d:write"))).map_err(xml_write_err)?;
        writer.write_event(Event::End(BytesEnd::new("d:locktype"))).map_err(xml_write_err)?;

        writer.write_event(Event::Start(BytesStart::new("d:lockscope"))).map_err(xml_write_err)?;
        let scope_tag = if lock.kind == LockKind::Exclusive { "d:exclusive" } else { "d:shared" };
        writer.write_event(Event::Empty(BytesStart::new(scope_tag))).map_err(xml_write_err)?;
        writer.write_event(Event::End(BytesEnd::new("d:lockscope"))).map_err(xml_write_err)?;

        let depth_text = if lock.depth == LockDepth::Infinity { "infinity" } else { "0" };
        write_text_element(writer, "d:depth", depth_text)?;

        writer.write_event(Event::Start(BytesStart::new("d:owner"))).map_err(xml_write_err)?;
        if let LockOwner::Opaque(text) = &lock.owner {
            writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_write_err)?;
        }
        writer.write_event(Event::End(BytesEnd::new("d:owner"))).map_err(xml_write_err)?;

        write_text_element(writer, "d:timeout", &format!("Second-{}", lock.timeout_seconds))?;

        writer.write_event(Event::Start(BytesStart::new("d:locktoken"))).map_err(xml_write_err)?;
        write_text_element(writer, "d:href", lock.token.as_str())?;
        writer.write_event(Event::End(BytesEnd::new("d:locktoken"))).map_err(xml_write_err)?;

        write_text_element(writer, "d:lockroot", href)?;

        writer.write_event(Event::End(BytesEnd::new("d:activelock"))).map_err(xml_write_err)?;
        Ok(())
    }

    /// RFC 4918 `<d:error>` condition body, e.g. for 423/412/409 responses.
    pub fn generate_error_body(condition: &str) -> Vec<u8> {
        let mut writer = Writer::new(Vec::new());
        let mut error = BytesStart::new("d:error");
        error.push_attribute(("xmlns:d", DAV_NS));
        let _ = writer.write_event(Event::Start(error));
        let _ = writer.write_event(Event::Empty(BytesStart::new(format!("d:{}", condition))));
        let _ = writer.write_event(Event::End(BytesEnd::new("d:error")));
        writer.into_inner()
    }
}

/// Writes a dead property's value element. `DAV:`-namespaced properties use
/// the document-wide `d:` prefix; everything else declares its own
/// namespace inline via a default `xmlns` on the element, preserving the
/// namespace URI the client originally set the property under.
fn write_dead_property(writer: &mut Writer<Vec<u8>>, prop: &DeadProperty) -> XmlResult<()> {
    if prop.name.is_dav_namespace() {
        write_text_element(writer, &format!("d:{}", prop.name.name), &prop.value)
    } else {
        let mut start = BytesStart::new(prop.name.name.as_str());
        start.push_attribute(("xmlns", prop.name.namespace.as_str()));
        writer.write_event(Event::Start(start)).map_err(xml_write_err)?;
        writer.write_event(Event::Text(BytesText::new(&prop.value))).map_err(xml_write_err)?;
        writer.write_event(Event::End(BytesEnd::new(prop.name.name.as_str()))).map_err(xml_write_err)?;
        Ok(())
    }
}

fn write_property_name_only(writer: &mut Writer<Vec<u8>>, name: &PropertyName) -> XmlResult<()> {
    if name.is_dav_namespace() {
        writer
            .write_event(Event::Empty(BytesStart::new(format!("d:{}", name.name))))
            .map_err(xml_write_err)
    } else {
        let mut start = BytesStart::new(name.name.as_str());
        start.push_attribute(("xmlns", name.namespace.as_str()));
        writer.write_event(Event::Empty(start)).map_err(xml_write_err)
    }
}

fn resolved_namespace(ns: ResolveResult) -> String {
    match ns {
        ResolveResult::Bound(namespace) => String::from_utf8_lossy(namespace.as_ref()).into_owned(),
        _ => DAV_NS.to_string(),
    }
}

fn local_name(e: &BytesStart) -> String {
    let name = e.name();
    let raw = std::str::from_utf8(name.as_ref()).unwrap_or("");
    raw.rsplit(':').next().unwrap_or(raw).to_string()
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> XmlResult<()> {
    writer.write_event(Event::Start(BytesStart::new(tag))).map_err(xml_write_err)?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_write_err)?;
    writer.write_event(Event::End(BytesEnd::new(tag))).map_err(xml_write_err)?;
    Ok(())
}

fn xml_write_err(e: quick_xml::Error) -> XmlError {
    XmlError::Write(e.to_string())
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        403 => "Forbidden",
        409 => "Conflict",
        424 => "Failed Dependency",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_propfind_body_means_allprop() {
        let req = WebDavXml::parse_propfind(b"").unwrap();
        assert!(matches!(req, PropFindRequest::AllProps));
    }

    #[test]
    fn parses_allprop_request() {
        let body = br#"<?xml version="1.0"?><d:propfind xmlns:d="DAV:"><d:allprop/></d:propfind>"#;
        let req = WebDavXml::parse_propfind(body).unwrap();
        assert!(matches!(req, PropFindRequest::AllProps));
    }

    #[test]
    fn parses_named_prop_request() {
        let body = br#"<d:propfind xmlns:d="DAV:"><d:prop><d:displayname/><d:getcontentlength/></d:prop></d:propfind>"#;
        let req = WebDavXml::parse_propfind(body).unwrap();
        match req {
            PropFindRequest::PropNames(names) => assert_eq!(names.len(), 2),
            _ => panic!("expected PropNames"),
        }
    }

    #[test]
    fn parses_proppatch_set_preserves_custom_namespace() {
        use crate::domain::repositories::property_repository::PropertyUpdate;
        let body = br#"<d:propertyupdate xmlns:d="DAV:"><d:set><d:prop><x:tag xmlns:x="urn:test">v1</x:tag></d:prop></d:set></d:propertyupdate>"#;
        let updates = WebDavXml::parse_proppatch(body).unwrap();
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            PropertyUpdate::Set { name, value } => {
                assert_eq!(name.namespace, "urn:test");
                assert_eq!(name.name, "tag");
                assert_eq!(value, "v1");
            }
            _ => panic!("expected Set"),
        }
    }

    #[test]
    fn propfind_response_round_trips_custom_namespace() {
        use crate::domain::entities::property::{DeadProperty, PropertyName};
        use crate::domain::entities::path::NormalizedPath;
        use chrono::Utc;
        use uuid::Uuid;

        let now = Utc::now();
        let stat = ObjectStat {
            path: NormalizedPath::parse("/doc.txt").unwrap(),
            size: 7,
            content_type: "text/plain".to_string(),
            last_modified: now,
            created_at: now,
            is_collection: false,
        };
        let dead_properties = vec![DeadProperty {
            user_id: Uuid::new_v4(),
            path: stat.path.clone(),
            name: PropertyName::new("urn:test", "tag"),
            value: "v1".to_string(),
            is_live: false,
            created_at: now,
            updated_at: now,
        }];
        let entry = PropFindEntry { href: "/webdav/doc.txt".to_string(), stat, dead_properties };
        let xml = WebDavXml::generate_propfind_response(&[entry], &PropFindRequest::AllProps).unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.contains(r#"xmlns="urn:test""#));
        assert!(xml.contains("<tag"));
        assert!(xml.contains("v1"));
    }

    #[test]
    fn parses_proppatch_set_and_remove() {
        use crate::domain::repositories::property_repository::PropertyUpdate;
        let body = br#"<d:propertyupdate xmlns:d="DAV:">
            <d:set><d:prop><d:author>me</d:author></d:prop></d:set>
            <d:remove><d:prop><d:old/></d:prop></d:remove>
        </d:propertyupdate>"#;
        let updates = WebDavXml::parse_proppatch(body).unwrap();
        assert_eq!(updates.len(), 2);
        assert!(matches!(&updates[0], PropertyUpdate::Set { value, .. } if value == "me"));
        assert!(matches!(&updates[1], PropertyUpdate::Remove { .. }));
    }

    /// spec.md §4.4 LOCK: an empty body in new-lock mode defaults to
    /// exclusive/write, it is not a parse error.
    #[test]
    fn empty_lockinfo_body_defaults_to_exclusive_write() {
        let (kind, owner) = WebDavXml::parse_lockinfo(b"").unwrap();
        assert_eq!(kind, LockKind::Exclusive);
        assert!(matches!(owner, LockOwner::Opaque(text) if text.is_empty()));
    }

    #[test]
    fn parses_lockinfo_exclusive_with_owner() {
        let body = br#"<d:lockinfo xmlns:d="DAV:">
            <d:lockscope><d:exclusive/></d:lockscope>
            <d:locktype><d:write/></d:locktype>
            <d:owner>someone</d:owner>
        </d:lockinfo>"#;
        let (kind, owner) = WebDavXml::parse_lockinfo(body).unwrap();
        assert_eq!(kind, LockKind::Exclusive);
        match owner {
            LockOwner::Opaque(text) => assert_eq!(text, "someone"),
            _ => panic!("expected opaque owner"),
        }
    }
}
