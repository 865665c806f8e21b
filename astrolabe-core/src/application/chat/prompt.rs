//! System prompt composition.

/// Server name and the `instructions` it announced during the handshake
pub type ServerInstructions = (String, String);

/// Build the system message: the optional domain instructions, a blank
/// line, then the tool-usage section listing every registered tool.
pub fn compose_system_prompt(
    domain: Option<&str>,
    tools: &str,
    server_instructions: &[ServerInstructions],
) -> String {
    let mut base = String::from(
        "É um assistente SRE especialista integrado com o Protocolo de Contexto do Modelo (MCP), \
         com acesso a várias ferramentas e recursos para ajudar em tarefas específicas.\n\n",
    );
    base.push_str("📚 FERRAMENTAS DISPONÍVEIS:\n");
    base.push_str(tools);
    base.push_str("\n\n");

    if !server_instructions.is_empty() {
        base.push_str("🧭 INSTRUÇÕES DOS SERVIDORES:\n");
        for (server, text) in server_instructions {
            base.push_str(&format!("- {server}: {}\n", text.trim()));
        }
        base.push('\n');
    }

    base.push_str(USAGE);

    match domain.map(str::trim).filter(|text| !text.is_empty()) {
        Some(domain) => format!("{domain}\n\n{base}"),
        None => base,
    }
}

const USAGE: &str = r#"🔧 INSTRUÇÕES DE USO:

1. Para usar uma ferramenta, responda APENAS com um JSON no formato:
{
  "tool": "nome_da_ferramenta",
  "arguments": {
    "param1": "valor1",
    "param2": "valor2"
  }
}

2. O JSON deve conter:
   - tool: o nome exato da ferramenta desejada
   - arguments: parâmetros exigidos pela ferramenta

3. Se a ferramenta retornar resultados, eles serão processados e incorporados ao contexto.

4. Para respostas que não exigem ferramentas, use texto natural.

⚠️ IMPORTANTE:
- Verifique os parâmetros obrigatórios para cada ferramenta.
- Use apenas as ferramentas listadas acima.
- Mantenha o formato JSON exato ao usar ferramentas.
- Responda em texto natural quando não estiver usando ferramentas."#;
