//! Recursive-descent reader for the persisted graph text.
//!
//! Parsing runs in two passes. The first builds the node tree and collects
//! connections with their endpoints exactly as written; the second resolves
//! port references once every node in the document is known, and derives the
//! ids left implicit. Current-format endpoints name port ids. Legacy text may
//! also name a port by its name in the direction the endpoint requires.

use crate::error::{ParseError, ParseResult, SourceLocation};
use crate::lexer::{tokenize, Spanned, Token};
use crate::FORMAT_VERSION;
use flowcore::{
    CodeNode, CodeNodeType, Connection, ControlConfig, ExposedPort, FlowGraph, GraphNode, Node,
    NodeBase, PassThruPort, Port, PortDirection, PortMapping, Position, DEFAULT_VERSION,
};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Deepest node nesting accepted by the reader. Root nodes sit at depth 1.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Parses a complete document into a graph.
pub fn parse(text: &str) -> ParseResult<FlowGraph> {
    let tokens = tokenize(text)?;
    let mut parser = Parser::new(tokens);
    let mut graph = parser.document()?;

    let table = PortTable::build(&graph, parser.format < FORMAT_VERSION);
    let mut seen = HashSet::new();
    parser.resolve_connections(&table, &mut graph.connections, &mut seen)?;
    parser.resolve_nested(&table, &mut graph.root_nodes, &mut seen)?;

    tracing::debug!(
        "Parsed graph {} (format {}, {} nodes, {} connections)",
        graph.name,
        parser.format,
        graph.node_count(),
        graph.connection_count()
    );
    Ok(graph)
}

#[derive(Debug, Clone, Copy)]
struct Site {
    location: SourceLocation,
    explicit_id: bool,
}

struct PortDraft {
    name: String,
    direction: PortDirection,
    data_type: String,
    id: Option<String>,
    required: bool,
    location: SourceLocation,
}

enum ExposedDraft {
    Plain(PortDraft),
    PassThru {
        port: PortDraft,
        upstream: (String, String),
        downstream: (String, String),
    },
}

impl ExposedDraft {
    fn port(&self) -> &PortDraft {
        match self {
            ExposedDraft::Plain(port) | ExposedDraft::PassThru { port, .. } => port,
        }
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    format: u32,
    node_ids: HashSet<String>,
    port_ids: HashSet<String>,
    explicit_connection_ids: HashSet<String>,
    sites: HashMap<String, Site>,
    next_placeholder: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            format: 1,
            node_ids: HashSet::new(),
            port_ids: HashSet::new(),
            explicit_connection_ids: HashSet::new(),
            sites: HashMap::new(),
            next_placeholder: 0,
            depth: 0,
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Spanned {
        // The stream always ends with Eof, which is never consumed.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Spanned {
        let spanned = self.peek().clone();
        if spanned.token != Token::Eof {
            self.pos += 1;
        }
        spanned
    }

    fn unexpected(&self, spanned: &Spanned, expected: &str) -> ParseError {
        match spanned.token {
            Token::Eof => ParseError::UnexpectedEof {
                expected: expected.to_string(),
                location: spanned.location,
            },
            ref other => ParseError::syntax(
                format!("expected {}, found {}", expected, other),
                spanned.location,
            ),
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> ParseResult<SourceLocation> {
        let spanned = self.advance();
        if spanned.token == token {
            Ok(spanned.location)
        } else {
            Err(self.unexpected(&spanned, expected))
        }
    }

    fn string(&mut self, expected: &str) -> ParseResult<String> {
        let spanned = self.advance();
        match spanned.token {
            Token::Str(value) => Ok(value),
            _ => Err(self.unexpected(&spanned, expected)),
        }
    }

    fn ident(&mut self, expected: &str) -> ParseResult<(String, SourceLocation)> {
        let spanned = self.advance();
        match spanned.token {
            Token::Ident(word) => Ok((word, spanned.location)),
            _ => Err(self.unexpected(&spanned, expected)),
        }
    }

    fn int(&mut self, expected: &str) -> ParseResult<(i64, SourceLocation)> {
        let spanned = self.advance();
        match spanned.token {
            Token::Int(value) => Ok((value, spanned.location)),
            _ => Err(self.unexpected(&spanned, expected)),
        }
    }

    fn number(&mut self, expected: &str) -> ParseResult<f64> {
        let spanned = self.advance();
        match spanned.token {
            Token::Int(value) => Ok(value as f64),
            Token::Float(value) => Ok(value),
            _ => Err(self.unexpected(&spanned, expected)),
        }
    }

    fn unsigned(setting: &str, value: i64, at: SourceLocation) -> ParseResult<u32> {
        u32::try_from(value).map_err(|_| {
            ParseError::invalid(format!("{} {} is out of range", setting, value), at)
        })
    }

    fn boolean(&mut self, expected: &str) -> ParseResult<bool> {
        let spanned = self.advance();
        match spanned.token {
            Token::Bool(value) => Ok(value),
            _ => Err(self.unexpected(&spanned, expected)),
        }
    }

    fn key_value(&mut self) -> ParseResult<(String, String)> {
        let key = self.string("key string")?;
        self.expect(Token::Equals, "'='")?;
        let value = self.string("value string")?;
        Ok((key, value))
    }

    fn endpoint(&mut self) -> ParseResult<(String, String)> {
        let node = self.string("node id")?;
        let port = self.string("port reference")?;
        Ok((node, port))
    }

    fn direction(word: &str) -> Option<PortDirection> {
        match word {
            "input" => Some(PortDirection::Input),
            "output" => Some(PortDirection::Output),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Document
    // ------------------------------------------------------------------

    fn document(&mut self) -> ParseResult<FlowGraph> {
        if matches!(&self.peek().token, Token::Ident(word) if word == "format") {
            self.advance();
            let (found, _) = self.int("format version")?;
            if found < 1 || found > i64::from(FORMAT_VERSION) {
                return Err(ParseError::UnsupportedFormat {
                    found,
                    supported: FORMAT_VERSION,
                });
            }
            self.format = found as u32;
        }

        let graph = self.graph_decl()?;
        self.expect(Token::Eof, "end of input")?;
        Ok(graph)
    }

    fn graph_decl(&mut self) -> ParseResult<FlowGraph> {
        let (keyword, location) = self.ident("'flowGraph'")?;
        if keyword != "flowGraph" && keyword != "graph" {
            return Err(ParseError::syntax(
                format!("expected 'flowGraph', found '{}'", keyword),
                location,
            ));
        }
        let name = self.string("graph name")?;
        let mut graph = FlowGraph::new(name.clone())
            .with_id(name)
            .with_version(DEFAULT_VERSION);

        if matches!(&self.peek().token, Token::Ident(word) if word == "version") {
            self.advance();
            graph.version = self.string("version string")?;
        }
        self.expect(Token::LBrace, "'{'")?;

        loop {
            let spanned = self.advance();
            let word = match spanned.token {
                Token::RBrace => break,
                Token::Ident(ref word) => word.clone(),
                _ => return Err(self.unexpected(&spanned, "graph item")),
            };
            match word.as_str() {
                "id" => graph.id = self.string("graph id")?,
                "version" => graph.version = self.string("version string")?,
                "description" => graph.description = Some(self.string("description string")?),
                "metadata" => {
                    let (key, value) = self.key_value()?;
                    graph.metadata.insert(key, value);
                }
                "target" => graph.target_platforms.push(self.string("target platform")?),
                "codeNode" | "node" | "graphNode" | "group" => {
                    let node = self.node_decl(&word, spanned.location)?;
                    graph.root_nodes.push(node);
                }
                "connect" | "connection" => {
                    let connection = self.connection_decl(spanned.location)?;
                    graph.connections.push(connection);
                }
                other => {
                    return Err(ParseError::syntax(
                        format!("unknown graph item '{}'", other),
                        spanned.location,
                    ))
                }
            }
        }
        Ok(graph)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    fn node_decl(&mut self, keyword: &str, location: SourceLocation) -> ParseResult<Node> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ParseError::invalid(
                format!("nodes nest deeper than {} levels", MAX_NESTING_DEPTH),
                location,
            ));
        }
        self.depth += 1;
        let node = self.node_body(keyword, location);
        self.depth -= 1;
        node
    }

    fn node_body(&mut self, keyword: &str, location: SourceLocation) -> ParseResult<Node> {
        let is_graph = matches!(keyword, "graphNode" | "group");
        let name = self.string("node name")?;
        self.expect(Token::LBrace, "'{'")?;

        let mut base = NodeBase::new(name.clone());
        let mut explicit_id = None;
        let mut code_node_type = CodeNodeType::default();
        let mut inputs: Vec<ExposedDraft> = Vec::new();
        let mut outputs: Vec<ExposedDraft> = Vec::new();
        let mut port_mappings = IndexMap::new();
        let mut children = Vec::new();
        let mut connections = Vec::new();

        loop {
            let spanned = self.advance();
            let word = match spanned.token {
                Token::RBrace => break,
                Token::Ident(ref word) => word.clone(),
                _ => return Err(self.unexpected(&spanned, "node item")),
            };
            let at = spanned.location;
            match word.as_str() {
                "id" => explicit_id = Some(self.string("node id")?),
                "position" => {
                    let x = self.number("x coordinate")?;
                    let y = self.number("y coordinate")?;
                    base.position = Position::new(x, y);
                }
                "description" => base.description = Some(self.string("description string")?),
                "state" => {
                    let (state, at) = self.ident("execution state")?;
                    base.execution_state =
                        state.parse().map_err(|e: String| ParseError::invalid(e, at))?;
                }
                "control" => base.control_config = self.control_block()?,
                "config" => {
                    let (key, value) = self.key_value()?;
                    base.configuration.insert(key, value);
                }
                "type" if !is_graph => {
                    let (kind, at) = self.ident("code node type")?;
                    code_node_type = kind.parse().map_err(|e: String| ParseError::invalid(e, at))?;
                }
                "input" | "output" => {
                    let direction = Self::direction(&word).unwrap_or(PortDirection::Input);
                    let port = self.port_decl(direction, at)?;
                    match direction {
                        PortDirection::Input => inputs.push(ExposedDraft::Plain(port)),
                        PortDirection::Output => outputs.push(ExposedDraft::Plain(port)),
                    }
                }
                "passThru" if is_graph => {
                    let draft = self.pass_thru_decl(at)?;
                    match draft.port().direction {
                        PortDirection::Input => inputs.push(draft),
                        PortDirection::Output => outputs.push(draft),
                    }
                }
                "map" | "portMapping" if is_graph => {
                    let exposed = self.string("exposed port name")?;
                    self.expect(Token::Arrow, "'->'")?;
                    let (child, child_port) = self.endpoint()?;
                    port_mappings.insert(exposed, PortMapping::new(child, child_port));
                }
                "codeNode" | "node" | "graphNode" | "group" if is_graph => {
                    children.push(self.node_decl(&word, at)?);
                }
                "connect" | "connection" if is_graph => {
                    connections.push(self.connection_decl(at)?);
                }
                other => {
                    let kind = if is_graph { "graph node" } else { "code node" };
                    return Err(ParseError::syntax(
                        format!("unexpected '{}' in {} '{}'", other, kind, name),
                        at,
                    ));
                }
            }
        }

        base.id = explicit_id.unwrap_or_else(|| name.clone());
        if !self.node_ids.insert(base.id.clone()) {
            return Err(ParseError::invalid(format!("duplicate node id '{}'", base.id), location));
        }

        if is_graph {
            let input_ports = self.finish_exposed(inputs, &base.id)?;
            let output_ports = self.finish_exposed(outputs, &base.id)?;
            Ok(Node::Graph(GraphNode {
                base,
                child_nodes: children,
                internal_connections: connections,
                input_ports,
                output_ports,
                port_mappings,
            }))
        } else {
            let input_ports = self.finish_plain(inputs, &base.id)?;
            let output_ports = self.finish_plain(outputs, &base.id)?;
            Ok(Node::Code(CodeNode {
                base,
                code_node_type,
                input_ports,
                output_ports,
            }))
        }
    }

    fn control_block(&mut self) -> ParseResult<ControlConfig> {
        self.expect(Token::LBrace, "'{'")?;
        let mut control = ControlConfig::default();
        loop {
            let spanned = self.advance();
            let word = match spanned.token {
                Token::RBrace => break,
                Token::Ident(ref word) => word.clone(),
                _ => return Err(self.unexpected(&spanned, "control setting")),
            };
            match word.as_str() {
                "pauseBufferSize" => {
                    let (value, at) = self.int("buffer size")?;
                    control.pause_buffer_size = Self::unsigned("pauseBufferSize", value, at)?;
                }
                "speedAttenuation" => {
                    let (value, at) = self.int("attenuation")?;
                    control.speed_attenuation = Self::unsigned("speedAttenuation", value, at)?;
                }
                "independentControl" => control.independent_control = self.boolean("boolean")?,
                "autoResumeOnError" => control.auto_resume_on_error = self.boolean("boolean")?,
                other => {
                    return Err(ParseError::syntax(
                        format!("unknown control setting '{}'", other),
                        spanned.location,
                    ))
                }
            }
        }
        Ok(control)
    }

    fn port_decl(
        &mut self,
        direction: PortDirection,
        location: SourceLocation,
    ) -> ParseResult<PortDraft> {
        let name = self.string("port name")?;
        self.expect(Token::Colon, "':'")?;
        let data_type = self.string("data type")?;
        let mut draft = PortDraft {
            name,
            direction,
            data_type,
            id: None,
            required: false,
            location,
        };
        if self.peek().token == Token::LBrace {
            self.advance();
            loop {
                let spanned = self.advance();
                match spanned.token {
                    Token::RBrace => break,
                    Token::Ident(ref word) if !self.port_item(word, &mut draft)? => {
                        return Err(ParseError::syntax(
                            format!("unknown port setting '{}'", word),
                            spanned.location,
                        ))
                    }
                    Token::Ident(_) => {}
                    _ => return Err(self.unexpected(&spanned, "port setting")),
                }
            }
        }
        Ok(draft)
    }

    /// Returns false when `word` is not a port setting.
    fn port_item(&mut self, word: &str, draft: &mut PortDraft) -> ParseResult<bool> {
        match word {
            "id" => draft.id = Some(self.string("port id")?),
            "required" => draft.required = self.boolean("boolean")?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn pass_thru_decl(&mut self, location: SourceLocation) -> ParseResult<ExposedDraft> {
        let (word, at) = self.ident("'input' or 'output'")?;
        let direction = Self::direction(&word).ok_or_else(|| {
            ParseError::syntax(format!("expected 'input' or 'output', found '{}'", word), at)
        })?;
        let name = self.string("port name")?;
        self.expect(Token::Colon, "':'")?;
        let data_type = self.string("data type")?;
        let mut port = PortDraft {
            name,
            direction,
            data_type,
            id: None,
            required: false,
            location,
        };
        let mut upstream = None;
        let mut downstream = None;

        self.expect(Token::LBrace, "'{'")?;
        loop {
            let spanned = self.advance();
            let word = match spanned.token {
                Token::RBrace => break,
                Token::Ident(ref word) => word.clone(),
                _ => return Err(self.unexpected(&spanned, "pass-thru setting")),
            };
            match word.as_str() {
                "upstream" => upstream = Some(self.endpoint()?),
                "downstream" => downstream = Some(self.endpoint()?),
                other => {
                    if !self.port_item(other, &mut port)? {
                        return Err(ParseError::syntax(
                            format!("unknown pass-thru setting '{}'", other),
                            spanned.location,
                        ));
                    }
                }
            }
        }

        match (upstream, downstream) {
            (Some(upstream), Some(downstream)) => Ok(ExposedDraft::PassThru {
                port,
                upstream,
                downstream,
            }),
            _ => Err(ParseError::invalid(
                format!("pass-thru port '{}' needs both upstream and downstream", port.name),
                location,
            )),
        }
    }

    fn finish_port(&mut self, draft: PortDraft, owner: &str) -> ParseResult<Port> {
        let id = draft
            .id
            .unwrap_or_else(|| Port::derived_id(owner, draft.direction, &draft.name));
        if !self.port_ids.insert(id.clone()) {
            return Err(ParseError::invalid(format!("duplicate port id '{}'", id), draft.location));
        }
        Ok(Port::new(owner, draft.name, draft.direction, draft.data_type)
            .with_id(id)
            .with_required(draft.required))
    }

    fn finish_plain(&mut self, drafts: Vec<ExposedDraft>, owner: &str) -> ParseResult<Vec<Port>> {
        drafts
            .into_iter()
            .map(|draft| match draft {
                ExposedDraft::Plain(port) | ExposedDraft::PassThru { port, .. } => {
                    self.finish_port(port, owner)
                }
            })
            .collect()
    }

    fn finish_exposed(
        &mut self,
        drafts: Vec<ExposedDraft>,
        owner: &str,
    ) -> ParseResult<Vec<ExposedPort>> {
        drafts
            .into_iter()
            .map(|draft| match draft {
                ExposedDraft::Plain(port) => self.finish_port(port, owner).map(ExposedPort::Plain),
                ExposedDraft::PassThru {
                    port,
                    upstream,
                    downstream,
                } => {
                    let port = self.finish_port(port, owner)?;
                    Ok(ExposedPort::PassThru(PassThruPort {
                        port,
                        upstream_node_id: upstream.0,
                        upstream_port_id: upstream.1,
                        downstream_node_id: downstream.0,
                        downstream_port_id: downstream.1,
                    }))
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    fn connection_decl(&mut self, location: SourceLocation) -> ParseResult<Connection> {
        let (source_node, source_port) = self.endpoint()?;
        self.expect(Token::Arrow, "'->'")?;
        let (target_node, target_port) = self.endpoint()?;
        let mut connection = Connection::new(source_node, source_port, target_node, target_port);
        let mut explicit_id = None;

        if self.peek().token == Token::LBrace {
            self.advance();
            loop {
                let spanned = self.advance();
                let word = match spanned.token {
                    Token::RBrace => break,
                    Token::Ident(ref word) => word.clone(),
                    _ => return Err(self.unexpected(&spanned, "connection setting")),
                };
                match word.as_str() {
                    "id" => explicit_id = Some(self.string("connection id")?),
                    "capacity" => {
                        let (value, at) = self.int("channel capacity")?;
                        connection.channel_capacity = i32::try_from(value)
                            .ok()
                            .filter(|capacity| *capacity >= flowcore::UNLIMITED)
                            .ok_or_else(|| {
                                ParseError::invalid(
                                    format!(
                                        "channel capacity {} must be -1, 0 or a positive depth",
                                        value
                                    ),
                                    at,
                                )
                            })?;
                    }
                    "ipType" => connection.ip_type_id = Some(self.string("payload type")?),
                    "segment" => self.segment_decl()?,
                    other => {
                        return Err(ParseError::syntax(
                            format!("unknown connection setting '{}'", other),
                            spanned.location,
                        ))
                    }
                }
            }
        }

        let explicit = explicit_id.is_some();
        connection.id = match explicit_id {
            Some(id) => {
                if !self.explicit_connection_ids.insert(id.clone()) {
                    return Err(ParseError::invalid(
                        format!("duplicate connection id '{}'", id),
                        location,
                    ));
                }
                id
            }
            None => {
                self.next_placeholder += 1;
                format!("\u{0}{}", self.next_placeholder)
            }
        };
        self.sites.insert(
            connection.id.clone(),
            Site {
                location,
                explicit_id: explicit,
            },
        );
        Ok(connection)
    }

    /// Segments are derived data; the statement is read and dropped.
    fn segment_decl(&mut self) -> ParseResult<()> {
        self.endpoint()?;
        self.expect(Token::Arrow, "'->'")?;
        self.endpoint()?;
        if matches!(&self.peek().token, Token::Ident(word) if word == "scope") {
            self.advance();
            self.string("scope id")?;
        }
        Ok(())
    }

    fn resolve_connections(
        &self,
        table: &PortTable,
        connections: &mut [Connection],
        seen: &mut HashSet<String>,
    ) -> ParseResult<()> {
        for connection in connections.iter_mut() {
            let site = self.sites.get(&connection.id).copied().unwrap_or(Site {
                location: SourceLocation::new(1, 1),
                explicit_id: true,
            });
            connection.source_port_id = table
                .resolve(
                    &connection.source_node_id,
                    &connection.source_port_id,
                    PortDirection::Output,
                )
                .map_err(|message| ParseError::invalid(message, site.location))?;
            connection.target_port_id = table
                .resolve(
                    &connection.target_node_id,
                    &connection.target_port_id,
                    PortDirection::Input,
                )
                .map_err(|message| ParseError::invalid(message, site.location))?;

            if !site.explicit_id {
                connection.id = Connection::derived_id(
                    &connection.source_node_id,
                    &connection.source_port_id,
                    &connection.target_node_id,
                    &connection.target_port_id,
                );
            }
            if !seen.insert(connection.id.clone()) {
                return Err(ParseError::invalid(
                    format!("duplicate connection id '{}'", connection.id),
                    site.location,
                ));
            }
        }
        Ok(())
    }

    fn resolve_nested(
        &self,
        table: &PortTable,
        nodes: &mut [Node],
        seen: &mut HashSet<String>,
    ) -> ParseResult<()> {
        for node in nodes.iter_mut() {
            if let Node::Graph(graph) = node {
                self.resolve_connections(table, &mut graph.internal_connections, seen)?;
                self.resolve_nested(table, &mut graph.child_nodes, seen)?;
            }
        }
        Ok(())
    }
}

/// Port ids, names and directions per node id, detached from the graph so
/// connections can be rewritten in place.
struct PortTable {
    ports: HashMap<String, Vec<(String, String, PortDirection)>>,
    match_names: bool,
}

impl PortTable {
    fn build(graph: &FlowGraph, match_names: bool) -> Self {
        let ports = graph
            .nodes()
            .into_iter()
            .map(|node| {
                let ports = node
                    .all_ports()
                    .into_iter()
                    .map(|port| (port.id.clone(), port.name.clone(), port.direction))
                    .collect();
                (node.id().to_string(), ports)
            })
            .collect();
        Self { ports, match_names }
    }

    /// Unknown nodes and ports are kept verbatim; they surface later as
    /// resolution or lowering diagnostics.
    fn resolve(
        &self,
        node_id: &str,
        port_ref: &str,
        required: PortDirection,
    ) -> Result<String, String> {
        let Some(ports) = self.ports.get(node_id) else {
            return Ok(port_ref.to_string());
        };
        let wrong_direction = |id: &str| {
            format!(
                "port '{}' on '{}' is an {} port but the endpoint needs an {} port",
                id,
                node_id,
                required.opposite(),
                required
            )
        };

        if let Some((id, _, direction)) = ports.iter().find(|(id, _, _)| id == port_ref) {
            return if *direction == required {
                Ok(id.clone())
            } else {
                Err(wrong_direction(id.as_str()))
            };
        }
        if !self.match_names {
            return Ok(port_ref.to_string());
        }
        if let Some((id, _, _)) = ports
            .iter()
            .find(|(_, name, direction)| name == port_ref && *direction == required)
        {
            return Ok(id.clone());
        }
        if ports.iter().any(|(_, name, _)| name == port_ref) {
            return Err(wrong_direction(port_ref));
        }
        Ok(port_ref.to_string())
    }
}
