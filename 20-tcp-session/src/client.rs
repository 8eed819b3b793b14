use anyhow::Result;
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{info, warn};

use crate::{
    cli::ClientArgs,
    command::ControlToken,
    endpoint::{Endpoint, Received},
};

const LINE_ENDINGS: &[u8] = b"\n\r";

/// Local command that prints [`HELP_TEXT`] instead of being sent.
pub const HELP_COMMAND: &str = "help";

pub const HELP_TEXT: &str = "Type a message and press enter to send it to the server
Commands
   help - displays this text
   qqq  - close the client
   qqqs - close the server and the client";

pub const SERVER_CLOSED: &str = "*** server closed the connection";

pub async fn run(args: ClientArgs) -> Result<()> {
    let framing = args.framing.framing()?;

    let endpoint = match Endpoint::connect(&args.host, args.port, &framing).await {
        Ok(endpoint) => endpoint,
        Err(err) => {
            warn!(host = %args.host, port = args.port, error = ?err, "unable to connect to a server");
            return Ok(());
        }
    };
    info!(peer = %endpoint.peer(), "connected");

    drive(
        endpoint,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Prints the greeting, then relays operator lines from `input` and prints
/// each reply to `output` until a control token, end of input, or the server
/// hanging up.
pub async fn drive<S, I, O>(mut endpoint: Endpoint<S>, mut input: I, mut output: O) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    match endpoint.receive().await {
        Ok(Received::Frame(greeting)) => write_line(&mut output, &greeting.text()).await?,
        Ok(Received::EndOfStream) => {
            write_line(&mut output, SERVER_CLOSED).await?;
            return Ok(());
        }
        Err(err) => warn!(error = ?err, "failed to read greeting"),
    }
    write_line(&mut output, HELP_TEXT).await?;

    // Operator input is relayed as raw bytes; it need not be UTF-8.
    let mut line = Vec::new();
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line).await? == 0 {
            break;
        }

        let payload = trim_line_ending(&line);
        if payload.is_empty() {
            continue;
        }
        if payload == HELP_COMMAND.as_bytes() {
            write_line(&mut output, HELP_TEXT).await?;
            continue;
        }

        let sent = endpoint.send(payload).await;
        if let Err(err) = &sent {
            warn!(error = ?err, "failed to send message to server");
        }

        let token = std::str::from_utf8(payload)
            .ok()
            .and_then(ControlToken::parse);
        if let Some(token) = token {
            info!(token = token.as_str(), "leaving");
            break;
        }
        if sent.is_err() {
            continue;
        }

        match endpoint.receive().await {
            Ok(Received::Frame(reply)) => write_line(&mut output, &reply.text()).await?,
            Ok(Received::EndOfStream) => {
                write_line(&mut output, SERVER_CLOSED).await?;
                break;
            }
            Err(err) => warn!(error = ?err, "failed to receive reply from server"),
        }
    }

    endpoint.close().await;
    Ok(())
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|byte| !LINE_ENDINGS.contains(byte))
        .map_or(0, |pos| pos + 1);
    &line[..end]
}

async fn write_line<O>(output: &mut O, line: &str) -> io::Result<()>
where
    O: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
