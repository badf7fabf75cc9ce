pub mod decode;
pub mod encode;
pub mod flow;
/// Server side of the Dovecot Authentication Protocol, enough for mail
/// daemons to delegate PLAIN logins to us.
///
/// ## Trace
///
/// ```text
/// C: VERSION	1	2
/// C: CPID	1
/// S: VERSION	1	2
/// S: MECH	PLAIN	plaintext
/// S: SPID	15
/// S: CUID	19350
/// S: COOKIE	f56692bee41f471ed01bd83520025305
/// S: DONE
///
/// C: AUTH	2	PLAIN	service=pop3	rip=1.2.3.4	resp=AHRlc3R1c2VyQGV4YW1wbGUuY29tAHRlc3QxMjM=
/// S: OK	2	user=testuser@example.com
///
/// C: AUTH	3	PLAIN	service=imap	rip=1.2.3.4
/// S: CONT	3
/// C: CONT	3	AHRlc3R1c2VyQGV4YW1wbGUuY29tAHRlc3QxMjM=
/// S: FAIL	3	user=testuser@example.com
/// ```
///
/// ## References
///
/// https://doc.dovecot.org/developer_manual/design/auth_protocol/
/// https://datatracker.ietf.org/doc/html/rfc4616
pub mod types;
