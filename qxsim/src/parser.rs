use crate::error::SimError;

/// One gate line as written in the source, before it is resolved to a gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub name: String,
    pub qubits: Vec<usize>,
    pub params: Vec<f64>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubCircuitAst {
    pub name: String,
    pub iterations: usize,
    pub instructions: Vec<Instruction>,
}

impl SubCircuitAst {
    fn new(name: impl Into<String>, iterations: usize) -> Self {
        Self {
            name: name.into(),
            iterations,
            instructions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorModelAst {
    pub name: String,
    pub params: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgramAst {
    pub num_qubits: usize,
    pub subcircuits: Vec<SubCircuitAst>,
    pub error_model: Option<ErrorModelAst>,
}

fn parse_error(line: usize, message: impl Into<String>) -> SimError {
    SimError::Parse {
        line,
        message: message.into(),
    }
}

/// A line-oriented parser for a small cQASM subset:
///
/// ```text
/// version 1.0
/// qubits 2
/// error_model depolarizing_channel, 0.001
/// .init
///   h q[0]
/// .entangle(3)
///   cnot q[0], q[1]
/// measure_all
/// ```
///
/// Gate names are not checked here; an unknown gate only fails when the
/// program is loaded, so that its sub-circuit can be skipped on its own.
pub fn parse_program(src: &str) -> Result<ProgramAst, SimError> {
    let mut num_qubits = None;
    let mut error_model = None;
    let mut subcircuits: Vec<SubCircuitAst> = Vec::new();

    for (idx, raw) in src.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw
            .split('#')
            .next()
            .unwrap_or("")
            .split("//")
            .next()
            .unwrap_or("")
            .trim();
        if line.is_empty() || line.starts_with("version") {
            continue;
        }

        if let Some(rest) = line.strip_prefix("qubits") {
            let n = rest
                .trim()
                .parse::<usize>()
                .map_err(|_| {
                    parse_error(line_no, format!("invalid qubit count '{}'", rest.trim()))
                })?;
            num_qubits = Some(n);
        } else if let Some(rest) = line.strip_prefix("error_model") {
            let mut parts = rest.split(',').map(str::trim);
            let name = parts
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| parse_error(line_no, "error model without a name"))?;
            let params = parts
                .map(|p| {
                    p.parse::<f64>().map_err(|_| {
                        parse_error(line_no, format!("invalid error model parameter '{p}'"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            error_model = Some(ErrorModelAst {
                name: name.to_string(),
                params,
            });
        } else if let Some(header) = line.strip_prefix('.') {
            subcircuits.push(parse_header(header, line_no)?);
        } else {
            if num_qubits.is_none() {
                return Err(parse_error(line_no, "gate before qubits declaration"));
            }
            let instruction = parse_instruction(line, line_no)?;
            if subcircuits.is_empty() {
                subcircuits.push(SubCircuitAst::new("default", 1));
            }
            if let Some(current) = subcircuits.last_mut() {
                current.instructions.push(instruction);
            }
        }
    }

    let num_qubits = num_qubits.ok_or_else(|| parse_error(0, "missing qubits declaration"))?;
    Ok(ProgramAst {
        num_qubits,
        subcircuits,
        error_model,
    })
}

fn parse_header(header: &str, line_no: usize) -> Result<SubCircuitAst, SimError> {
    let header = header.trim();
    match header.find('(') {
        None => {
            if header.is_empty() {
                return Err(parse_error(line_no, "sub-circuit without a name"));
            }
            Ok(SubCircuitAst::new(header, 1))
        }
        Some(start) => {
            let end = header
                .rfind(')')
                .filter(|&end| end > start)
                .ok_or_else(|| parse_error(line_no, "unterminated iteration count"))?;
            let iterations = header[start + 1..end]
                .trim()
                .parse::<usize>()
                .map_err(|_| parse_error(line_no, "invalid iteration count"))?;
            Ok(SubCircuitAst::new(header[..start].trim(), iterations))
        }
    }
}

fn parse_instruction(line: &str, line_no: usize) -> Result<Instruction, SimError> {
    let (name, args) = match line.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (line, ""),
    };
    let mut qubits = Vec::new();
    let mut params = Vec::new();

    for arg in args.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        if let Some(index) = arg.strip_prefix("q[").and_then(|a| a.strip_suffix(']')) {
            let q = index
                .trim()
                .parse::<usize>()
                .map_err(|_| parse_error(line_no, format!("invalid qubit operand '{arg}'")))?;
            qubits.push(q);
        } else if let Ok(value) = arg.parse::<f64>() {
            params.push(value);
        } else {
            return Err(parse_error(line_no, format!("invalid operand '{arg}'")));
        }
    }

    Ok(Instruction {
        name: name.to_ascii_lowercase(),
        qubits,
        params,
        line: line_no,
    })
}
